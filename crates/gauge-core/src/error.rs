use thiserror::Error;

use crate::analyzer::AnalyzerKind;

/// Errors raised while wiring or running analyzers.
///
/// Every variant is a configuration defect: the run is aborted and nothing
/// is retried.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("the {analyzer} analyzer requires the {required} analyzer, which was never wired")]
    MissingAnalyzer {
        analyzer: AnalyzerKind,
        required: AnalyzerKind,
    },

    #[error("the {analyzer} analyzer cannot be wired with a {given} analyzer")]
    UnexpectedAnalyzer {
        analyzer: AnalyzerKind,
        given: AnalyzerKind,
    },

    #[error("no analyzer matches '{0}'")]
    UnknownAnalyzer(String),
}

/// Errors raised by result cache drivers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
