//! Renderers for [`gauge_core::MetricsReport`].

pub mod json;
pub mod markdown;
pub mod text;

/// Metric keys shown for types in the condensed text and Markdown views.
pub const TYPE_COLUMNS: &[&str] = &["loc", "nom", "wmc", "dit", "cis", "lcomHS", "tcc"];

/// Metric keys shown for packages.
pub const PACKAGE_COLUMNS: &[&str] = &["noc", "noi", "ca", "ce", "a", "i", "d"];

/// Render a metric value: whole numbers without decimals, NaN as `n/a`.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
