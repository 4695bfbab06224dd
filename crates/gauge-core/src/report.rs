use serde::Serialize;

use crate::analyzer::{AnalyzerHandle, AnalyzerKind, Metrics};
use crate::graph::CodeGraph;
use crate::types::{Callable, NodeId, Package, TypeDecl, TypeKind};

/// Snapshot of every analyzer's results, grouped the way the code is.
///
/// Metrics from all analyzers are merged per node; their key sets do not
/// overlap. Abstractness of a package without types is NaN and serializes
/// as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub project: String,
    pub analyzers: Vec<AnalyzerKind>,
    /// Project-wide metrics.
    pub summary: Metrics,
    pub packages: Vec<PackageReport>,
    /// Package dependency cycles, by package name.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    pub name: String,
    pub metrics: Metrics,
    pub types: Vec<TypeReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<CallableReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeReport {
    pub name: String,
    pub kind: TypeKind,
    pub metrics: Metrics,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<CallableReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallableReport {
    pub name: String,
    pub metrics: Metrics,
}

impl MetricsReport {
    /// Collect the results of analyzers that have already run. Library
    /// packages are left out.
    pub fn build(graph: &CodeGraph, analyzers: &[AnalyzerHandle]) -> Self {
        let merged = |id: NodeId| -> Metrics {
            analyzers
                .iter()
                .flat_map(|handle| handle.node_metrics(id))
                .collect()
        };
        let callable = |c: &Callable| CallableReport {
            name: c.name.clone(),
            metrics: merged(c.id),
        };
        let type_report = |t: &TypeDecl| TypeReport {
            name: t.name.clone(),
            kind: t.kind,
            metrics: merged(t.id),
            methods: graph.methods_of(t).map(callable).collect(),
        };
        let package_report = |p: &Package| PackageReport {
            name: p.name.clone(),
            metrics: merged(p.id),
            types: graph.types_of(p).map(type_report).collect(),
            functions: graph.functions_of(p).map(callable).collect(),
        };

        let summary = analyzers
            .iter()
            .filter_map(AnalyzerHandle::project_metrics)
            .flatten()
            .collect();

        let cycles = analyzers
            .iter()
            .find_map(AnalyzerHandle::as_coupling)
            .map(|coupling| {
                let groups = coupling.borrow().cycles();
                groups
                    .into_iter()
                    .map(|group| {
                        group
                            .into_iter()
                            .filter_map(|id| graph.package(id).map(|p| p.name.clone()))
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            project: graph.name.clone(),
            analyzers: analyzers.iter().map(AnalyzerHandle::kind).collect(),
            summary,
            packages: graph
                .packages()
                .filter(|p| p.user_defined)
                .map(package_report)
                .collect(),
            cycles,
        }
    }

    pub fn package(&self, name: &str) -> Option<&PackageReport> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Number of types across all packages.
    pub fn type_count(&self) -> usize {
        self.packages.iter().map(|p| p.types.len()).sum()
    }
}

impl PackageReport {
    pub fn type_report(&self, name: &str) -> Option<&TypeReport> {
        self.types.iter().find(|t| t.name == name)
    }
}
