use gauge_core::{Metrics, MetricsReport};

use crate::{format_value, PACKAGE_COLUMNS, TYPE_COLUMNS};

/// Format a metrics report as Markdown.
pub fn format_report(report: &MetricsReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("# gauge - {}\n\n", report.project));

    // Summary
    out.push_str("## Summary\n\n");
    out.push_str(&format!(
        "- **Packages:** {}\n- **Types:** {}\n",
        report.packages.len(),
        report.type_count(),
    ));
    for (key, value) in &report.summary {
        out.push_str(&format!("- **{key}:** {}\n", format_value(*value)));
    }

    out.push_str("\n## Packages\n\n");
    out.push_str(&header("Package", PACKAGE_COLUMNS));
    for package in &report.packages {
        out.push_str(&row(&package.name, &package.metrics, PACKAGE_COLUMNS));
    }

    for package in report.packages.iter().filter(|p| !p.types.is_empty()) {
        out.push_str(&format!("\n### {}\n\n", package.name));
        out.push_str(&header("Type", TYPE_COLUMNS));
        for ty in &package.types {
            out.push_str(&row(&format!("{} `{}`", ty.kind, ty.name), &ty.metrics, TYPE_COLUMNS));
        }
    }

    if !report.cycles.is_empty() {
        out.push_str("\n## Package Cycles\n\n");
        for cycle in &report.cycles {
            out.push_str(&format!("- {}\n", cycle.join(" → ")));
        }
    }

    out
}

fn header(first: &str, columns: &[&str]) -> String {
    let mut out = format!("| {first} |");
    for column in columns {
        out.push_str(&format!(" {column} |"));
    }
    out.push_str("\n|---|");
    out.push_str(&"---|".repeat(columns.len()));
    out.push('\n');
    out
}

fn row(label: &str, metrics: &Metrics, columns: &[&str]) -> String {
    let mut out = format!("| {label} |");
    for column in columns {
        let cell = metrics.get(*column).map_or("-".to_string(), |v| format_value(*v));
        out.push_str(&format!(" {cell} |"));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_core::{AnalyzerOptions, AnalyzerRegistry, CodeGraph, TypeKind};

    #[test]
    fn test_markdown_tables() {
        let mut graph = CodeGraph::new("demo");
        let app = graph.add_package("app");
        let ty = graph.add_type(app, "Mailer", TypeKind::Trait);
        graph.add_method(ty, "send");
        graph.add_package("empty");

        let mut registry = AnalyzerRegistry::new(AnalyzerOptions::default());
        let handles = registry.run(&graph, &["node-count", "coupling"]).unwrap();
        let md = format_report(&MetricsReport::build(&graph, &handles));

        assert!(md.starts_with("# gauge - demo\n"), "{md}");
        assert!(md.contains("| Package | noc | noi | ca | ce | a | i | d |"), "{md}");
        assert!(md.contains("| app | 1 | 0 | 0 | 0 | 1 | 0 | 1 |"), "{md}");
        assert!(md.contains("| empty | 0 | 0 | 0 | 0 | n/a | 0 | n/a |"), "{md}");
        assert!(md.contains("| trait `Mailer` | - | 1 | - |"), "{md}");
        assert!(!md.contains("Package Cycles"));
    }
}
