use colored::Colorize;

use gauge_core::report::{PackageReport, TypeReport};
use gauge_core::{Metrics, MetricsReport};

use crate::{format_value, PACKAGE_COLUMNS, TYPE_COLUMNS};

/// Methods above this extended complexity are highlighted.
const COMPLEX_METHOD: f64 = 10.0;

/// Format a metrics report for terminal output.
pub fn format_report(report: &MetricsReport) -> String {
    let mut out = String::new();

    // Header
    out.push_str(&format!(
        "\n{}\n",
        format!("gauge - Object-Oriented Metrics ({})", report.project).bold()
    ));
    out.push_str(&format!("{}\n\n", "=".repeat(40)));

    out.push_str(&format!(
        "{}: {} packages, {} types\n",
        "Summary".bold(),
        report.packages.len(),
        report.type_count(),
    ));
    if !report.summary.is_empty() {
        out.push_str(&format!("  {}\n", metric_line(&report.summary, None)));
    }

    for package in &report.packages {
        out.push_str(&format_package(package));
    }

    if report.cycles.is_empty() {
        out.push_str(&format!("\n{}\n", "No package cycles found!".green().bold()));
    } else {
        out.push_str(&format!(
            "\n{} ({} found)\n{}\n",
            "Package cycles".red().bold(),
            report.cycles.len(),
            "-".repeat(40),
        ));
        for cycle in &report.cycles {
            out.push_str(&format!("  {}\n", cycle.join(" <-> ")));
        }
    }

    out.push('\n');
    out
}

fn format_package(package: &PackageReport) -> String {
    let mut out = format!("\n{}\n{}\n", package.name.bold(), "-".repeat(40));
    if !package.metrics.is_empty() {
        out.push_str(&format!("  {}\n", metric_line(&package.metrics, Some(PACKAGE_COLUMNS))));
    }
    for ty in &package.types {
        out.push_str(&format_type(ty));
    }
    for function in &package.functions {
        out.push_str(&format!(
            "  fn {}  {}\n",
            function.name,
            complexity_label(&function.metrics)
        ));
    }
    out
}

fn format_type(ty: &TypeReport) -> String {
    let mut out = format!("  {} {}", ty.kind, ty.name.cyan());
    if !ty.metrics.is_empty() {
        out.push_str(&format!("  {}", metric_line(&ty.metrics, Some(TYPE_COLUMNS))));
    }
    out.push('\n');
    for method in &ty.methods {
        out.push_str(&format!(
            "    {}  {}\n",
            method.name,
            complexity_label(&method.metrics)
        ));
    }
    out
}

/// `key=value` pairs, restricted to `keys` when given, in that order.
fn metric_line(metrics: &Metrics, keys: Option<&[&str]>) -> String {
    let pairs: Vec<String> = match keys {
        Some(keys) => keys
            .iter()
            .filter_map(|&key| metrics.get(key).map(|v| format!("{key}={}", format_value(*v))))
            .collect(),
        None => metrics
            .iter()
            .map(|(key, v)| format!("{key}={}", format_value(*v)))
            .collect(),
    };
    pairs.join(" ")
}

fn complexity_label(metrics: &Metrics) -> String {
    let Some(&ccn2) = metrics.get("ccn2") else {
        return metric_line(metrics, Some(&["loc"]));
    };
    let label = format!("ccn2={}", format_value(ccn2));
    if ccn2 > COMPLEX_METHOD {
        label.yellow().to_string()
    } else {
        label
    }
}
