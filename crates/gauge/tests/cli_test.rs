use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use gauge_core::{CodeGraph, TypeKind, Visibility};

fn gauge_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gauge"));
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

/// Write a two-package graph with a dependency cycle into `dir`.
fn write_graph(dir: &Path) -> PathBuf {
    let mut graph = CodeGraph::new("shop");
    let orders = graph.add_package("orders");
    let billing = graph.add_package("billing");

    let order = graph.add_type(orders, "Order", TypeKind::Class);
    graph.add_property(order, "total", Visibility::Private);
    graph.add_method(order, "place");
    let invoice = graph.add_type(billing, "Invoice", TypeKind::Interface);
    graph.add_dependency(order, invoice);
    graph.add_dependency(invoice, order);

    let path = dir.join("graph.json");
    graph.save(&path).expect("failed to write graph");
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_analyze_text_report() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let graph = write_graph(dir.path());

    let output = gauge_cmd()
        .args(["analyze", graph.to_str().unwrap()])
        .output()
        .expect("failed to run gauge analyze");
    let out = stdout(&output);

    assert!(
        output.status.success(),
        "gauge analyze failed: stdout={out}, stderr={}",
        stderr(&output)
    );
    assert!(out.contains("gauge - Object-Oriented Metrics (shop)"), "{out}");
    assert!(out.contains("class Order"), "{out}");
    assert!(out.contains("Package cycles (1 found)"), "{out}");
    assert!(out.contains("orders <-> billing"), "{out}");
}

#[test]
fn test_analyze_json_with_selected_metrics() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let graph = write_graph(dir.path());

    let output = gauge_cmd()
        .args([
            "analyze",
            graph.to_str().unwrap(),
            "--metrics",
            "coupling,node-count",
            "--format",
            "json",
        ])
        .output()
        .expect("failed to run gauge analyze");
    assert!(output.status.success(), "stderr={}", stderr(&output));

    let parsed: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("should be valid JSON");
    assert_eq!(parsed["analyzers"], serde_json::json!(["node-count", "coupling"]));
    assert_eq!(parsed["packages"][0]["name"], "orders");
    assert_eq!(parsed["packages"][0]["metrics"]["ce"], 1.0);
    assert_eq!(parsed["packages"][1]["metrics"]["a"], 1.0);
    assert_eq!(parsed["cycles"][0], serde_json::json!(["orders", "billing"]));
}

#[test]
fn test_exclude_package_breaks_cycle() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let graph = write_graph(dir.path());

    let output = gauge_cmd()
        .args([
            "analyze",
            graph.to_str().unwrap(),
            "--metrics",
            "cycles",
            "--format",
            "json",
            "--exclude-package",
            "billing",
        ])
        .output()
        .expect("failed to run gauge analyze");
    assert!(output.status.success(), "stderr={}", stderr(&output));

    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert!(parsed.get("cycles").is_none(), "{parsed}");
    assert_eq!(parsed["packages"][0]["metrics"]["ce"], 0.0);
}

#[test]
fn test_config_next_to_graph_selects_metrics_and_cache() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let graph = write_graph(dir.path());
    std::fs::write(
        dir.path().join("gauge.toml"),
        "[analysis]\nmetrics = [\"loc\"]\n\n[cache]\nenabled = true\ndirectory = \"cache\"\n",
    )
    .unwrap();

    let output = gauge_cmd()
        .args(["analyze", graph.to_str().unwrap(), "--format", "json"])
        .output()
        .expect("failed to run gauge analyze");
    assert!(output.status.success(), "stderr={}", stderr(&output));

    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed["analyzers"], serde_json::json!(["loc"]));
    assert!(dir.path().join("cache").join("loc").is_dir());
}

#[test]
fn test_cache_directory_is_relative_to_discovered_config() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let graphs = dir.path().join("graphs");
    std::fs::create_dir_all(&graphs).unwrap();
    write_graph(&graphs);
    std::fs::write(
        dir.path().join("gauge.toml"),
        "[cache]\nenabled = true\ndirectory = \"cachedir\"\n",
    )
    .unwrap();

    let output = gauge_cmd()
        .args(["analyze", "graphs/graph.json", "-m", "loc"])
        .current_dir(dir.path())
        .output()
        .expect("failed to run gauge analyze");
    assert!(output.status.success(), "stderr={}", stderr(&output));

    assert!(dir.path().join("cachedir").join("loc").is_dir());
    assert!(!graphs.join("cachedir").exists());
}

#[test]
fn test_no_cache_skips_cache_directory() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let graph = write_graph(dir.path());
    std::fs::write(
        dir.path().join("gauge.toml"),
        "[cache]\nenabled = true\ndirectory = \"cache\"\n",
    )
    .unwrap();

    let output = gauge_cmd()
        .args(["analyze", graph.to_str().unwrap(), "--no-cache"])
        .output()
        .expect("failed to run gauge analyze");
    assert!(output.status.success(), "stderr={}", stderr(&output));
    assert!(!dir.path().join("cache").exists());
}

#[test]
fn test_markdown_format() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let graph = write_graph(dir.path());

    let output = gauge_cmd()
        .args(["analyze", graph.to_str().unwrap(), "-f", "markdown"])
        .output()
        .expect("failed to run gauge analyze");
    let out = stdout(&output);
    assert!(output.status.success(), "stderr={}", stderr(&output));
    assert!(out.starts_with("# gauge - shop"), "{out}");
    assert!(out.contains("## Package Cycles"), "{out}");
}

#[test]
fn test_unknown_metric_fails() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let graph = write_graph(dir.path());

    let output = gauge_cmd()
        .args(["analyze", graph.to_str().unwrap(), "--metrics", "halstead"])
        .output()
        .expect("failed to run gauge analyze");
    assert_eq!(output.status.code(), Some(2));
    assert!(
        stderr(&output).contains("no analyzer matches 'halstead'"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn test_missing_graph_fails() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let output = gauge_cmd()
        .args(["analyze", dir.path().join("absent.json").to_str().unwrap()])
        .output()
        .expect("failed to run gauge analyze");
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("failed to read code graph"));
}

#[test]
fn test_list_shows_registrations() {
    let output = gauge_cmd()
        .arg("list")
        .output()
        .expect("failed to run gauge list");
    let out = stdout(&output);
    assert!(output.status.success());
    assert!(out.contains("class-level"), "{out}");
    assert!(out.contains("requires: cyclomatic"), "{out}");
    assert!(out.contains("requires: class-level, node-count"), "{out}");
    assert!(out.contains("[node-metrics, cycles]"), "{out}");
}

#[test]
fn test_init_creates_config() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let output = gauge_cmd()
        .arg("init")
        .current_dir(dir.path())
        .output()
        .expect("failed to run gauge init");
    assert!(output.status.success(), "init should succeed");

    let content = std::fs::read_to_string(dir.path().join("gauge.toml")).unwrap();
    assert!(content.contains("[analysis]"), "{content}");
    assert!(content.contains("[coupling]"), "{content}");
}

#[test]
fn test_init_refuses_overwrite() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    std::fs::write(dir.path().join("gauge.toml"), "existing").unwrap();

    let output = gauge_cmd()
        .arg("init")
        .current_dir(dir.path())
        .output()
        .expect("failed to run gauge init");
    assert!(!output.status.success(), "should refuse overwrite");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("gauge.toml")).unwrap(),
        "existing"
    );

    let forced = gauge_cmd()
        .args(["init", "--force"])
        .current_dir(dir.path())
        .output()
        .expect("failed to run gauge init --force");
    assert!(forced.status.success());
}
