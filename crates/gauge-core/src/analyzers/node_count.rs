use std::collections::HashMap;

use tracing::debug;

use super::to_metrics;
use crate::analyzer::{Analyzer, AnalyzerKind, Metrics};
use crate::config::AnalyzerOptions;
use crate::error::Result;
use crate::graph::CodeGraph;
use crate::types::{Callable, NodeId, Package, TypeDecl};
use crate::visitor::{walk_graph, walk_package, GraphVisitor};

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    noc: u32,
    noi: u32,
    nom: u32,
    nof: u32,
}

impl Counts {
    fn add(&mut self, other: Counts) {
        self.noc += other.noc;
        self.noi += other.noi;
        self.nom += other.nom;
        self.nof += other.nof;
    }

    fn to_metrics(self) -> Metrics {
        to_metrics([
            ("noc", self.noc as f64),
            ("noi", self.noi as f64),
            ("nom", self.nom as f64),
            ("nof", self.nof as f64),
        ])
    }
}

/// Counts declarations.
///
/// Types get `nom` (own methods). Packages get `noc` (classes and traits),
/// `noi` (interfaces), `nom` (methods of all their types) and `nof`
/// (functions); the project totals sum the packages.
#[derive(Debug)]
pub struct NodeCountAnalyzer {
    computed: bool,
    node_metrics: HashMap<NodeId, Metrics>,
    project_metrics: Metrics,
}

impl NodeCountAnalyzer {
    pub fn new(_options: &AnalyzerOptions) -> Self {
        Self {
            computed: false,
            node_metrics: HashMap::new(),
            project_metrics: Metrics::new(),
        }
    }

    /// Own method count of a type; 0 when unknown.
    pub fn nom(&self, ty: NodeId) -> f64 {
        self.node_metrics
            .get(&ty)
            .and_then(|m| m.get("nom"))
            .copied()
            .unwrap_or(0.0)
    }
}

impl Analyzer for NodeCountAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::NodeCount
    }

    fn analyze(&mut self, graph: &CodeGraph) -> Result<()> {
        if self.computed {
            return Ok(());
        }
        debug!(project = %graph.name, "counting nodes");

        let mut pass = CountPass::default();
        walk_graph(&mut pass, graph);

        self.node_metrics = pass.metrics;
        self.project_metrics = pass.total.to_metrics();
        self.computed = true;
        Ok(())
    }

    fn node_metrics(&self, node: NodeId) -> Metrics {
        self.node_metrics.get(&node).cloned().unwrap_or_default()
    }

    fn project_metrics(&self) -> Option<Metrics> {
        Some(self.project_metrics.clone())
    }
}

#[derive(Default)]
struct CountPass {
    current: Counts,
    total: Counts,
    metrics: HashMap<NodeId, Metrics>,
}

impl<'g> GraphVisitor<'g> for CountPass {
    fn visit_package(&mut self, graph: &'g CodeGraph, package: &'g Package) {
        self.current = Counts::default();
        walk_package(self, graph, package);
        self.metrics.insert(package.id, self.current.to_metrics());
        self.total.add(self.current);
    }

    fn visit_type(&mut self, _graph: &'g CodeGraph, ty: &'g TypeDecl) {
        if ty.is_interface() {
            self.current.noi += 1;
        } else {
            self.current.noc += 1;
        }
        let nom = ty.methods.len() as u32;
        self.current.nom += nom;
        self.metrics.insert(ty.id, to_metrics([("nom", nom as f64)]));
    }

    fn visit_function(&mut self, _graph: &'g CodeGraph, _function: &'g Callable) {
        self.current.nof += 1;
    }
}
