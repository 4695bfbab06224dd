pub mod analyzer;
pub mod analyzers;
pub mod cache;
pub mod config;
pub mod error;
pub mod expr;
pub mod graph;
pub mod registry;
pub mod report;
pub mod types;
pub mod visitor;

pub use analyzer::{Analyzer, AnalyzerHandle, AnalyzerKind, Capability, Metrics};
pub use config::{AnalyzerOptions, Config};
pub use error::{AnalysisError, CacheError};
pub use graph::CodeGraph;
pub use registry::AnalyzerRegistry;
pub use report::MetricsReport;
pub use types::*;
