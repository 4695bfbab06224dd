use anyhow::{Context, Result};

use gauge_core::MetricsReport;

/// Format a metrics report as JSON. NaN values become `null`.
pub fn format_report(report: &MetricsReport, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(report)
    } else {
        serde_json::to_string_pretty(report)
    };
    json.context("failed to serialize metrics report")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_core::{AnalyzerOptions, AnalyzerRegistry, CodeGraph, TypeKind};
    use pretty_assertions::assert_eq;

    fn sample_report() -> MetricsReport {
        let mut graph = CodeGraph::new("sample");
        let app = graph.add_package("app");
        let ty = graph.add_type(app, "Kernel", TypeKind::Class);
        graph.add_method(ty, "boot");
        graph.add_package("empty");

        let mut registry = AnalyzerRegistry::new(AnalyzerOptions::default());
        let handles = registry
            .run(&graph, &["node-count", "coupling", "class-level"])
            .unwrap();
        MetricsReport::build(&graph, &handles)
    }

    #[test]
    fn test_format_report_valid_json() {
        let json = format_report(&sample_report(), false).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("should be valid JSON");
        assert_eq!(parsed["project"], "sample");
        assert_eq!(parsed["analyzers"][0], "node-count");
        assert_eq!(parsed["packages"][0]["types"][0]["name"], "Kernel");
        assert_eq!(parsed["packages"][0]["types"][0]["kind"], "class");
        assert_eq!(parsed["packages"][0]["types"][0]["metrics"]["nom"], 1.0);
        assert!(parsed.get("cycles").is_none(), "empty cycles are omitted");
    }

    #[test]
    fn test_nan_abstractness_is_null() {
        let json = format_report(&sample_report(), true).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["packages"][1]["metrics"]["a"].is_null());
        assert_eq!(parsed["packages"][1]["metrics"]["i"], 0.0);
    }

    #[test]
    fn test_compact_is_single_line() {
        let json = format_report(&sample_report(), true).unwrap();
        assert!(!json.contains('\n'), "compact JSON should be single line");
        assert!(format_report(&sample_report(), false).unwrap().contains('\n'));
    }
}
