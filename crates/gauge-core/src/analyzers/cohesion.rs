use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use tracing::debug;

use super::{ratio, to_metrics, ClassLevelAnalyzer, NodeCountAnalyzer};
use crate::analyzer::{Analyzer, AnalyzerHandle, AnalyzerKind, Metrics};
use crate::config::AnalyzerOptions;
use crate::error::{AnalysisError, Result};
use crate::expr::{MemberKind, SelfAccessCollector};
use crate::graph::CodeGraph;
use crate::types::{NodeId, TypeDecl};
use crate::visitor::{walk_graph, GraphVisitor};

/// Lack-of-cohesion metrics over method/property access.
///
/// | metric | meaning |
/// |---|---|
/// | `nma` | method-to-property accesses |
/// | `lcomHS` | Henderson-Sellers: `1 - nma / (props * methods)` |
/// | `lcomCG` | `(methods - nma / props) / (methods - 1)` |
/// | `lcomCK` | Chidamber-Kemerer: disjoint pairs minus sharing pairs, floored at 0 |
/// | `tcc` | sharing pairs over all method pairs |
#[derive(Debug)]
pub struct CohesionAnalyzer {
    class_level: Option<Rc<RefCell<ClassLevelAnalyzer>>>,
    node_count: Option<Rc<RefCell<NodeCountAnalyzer>>>,
    computed: bool,
    node_metrics: HashMap<NodeId, Metrics>,
    /// `(conjoint, disjoint)` method pairs per type.
    pair_counts: HashMap<NodeId, (u32, u32)>,
}

impl CohesionAnalyzer {
    pub fn new(_options: &AnalyzerOptions) -> Self {
        Self {
            class_level: None,
            node_count: None,
            computed: false,
            node_metrics: HashMap::new(),
            pair_counts: HashMap::new(),
        }
    }

    /// Sharing and disjoint method pairs of a class, once analyzed.
    pub fn pair_counts(&self, ty: NodeId) -> Option<(u32, u32)> {
        self.pair_counts.get(&ty).copied()
    }

    fn missing(required: AnalyzerKind) -> AnalysisError {
        AnalysisError::MissingAnalyzer {
            analyzer: AnalyzerKind::Cohesion,
            required,
        }
    }
}

impl Analyzer for CohesionAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Cohesion
    }

    fn analyze(&mut self, graph: &CodeGraph) -> Result<()> {
        if self.computed {
            return Ok(());
        }
        let class_level = self
            .class_level
            .clone()
            .ok_or_else(|| Self::missing(AnalyzerKind::ClassLevel))?;
        let node_count = self
            .node_count
            .clone()
            .ok_or_else(|| Self::missing(AnalyzerKind::NodeCount))?;
        class_level.borrow_mut().analyze(graph)?;
        node_count.borrow_mut().analyze(graph)?;
        debug!(project = %graph.name, "computing cohesion metrics");

        let class_level = class_level.borrow();
        let node_count = node_count.borrow();
        let mut pass = CohesionPass {
            class_level: &class_level,
            node_count: &node_count,
            pair_counts: self.pair_counts.clone(),
            metrics: HashMap::new(),
        };
        walk_graph(&mut pass, graph);

        self.node_metrics = pass.metrics;
        self.pair_counts = pass.pair_counts;
        self.computed = true;
        Ok(())
    }

    fn node_metrics(&self, node: NodeId) -> Metrics {
        self.node_metrics.get(&node).cloned().unwrap_or_default()
    }

    fn required_analyzers(&self) -> &'static [AnalyzerKind] {
        &[AnalyzerKind::ClassLevel, AnalyzerKind::NodeCount]
    }

    fn add_analyzer(&mut self, analyzer: AnalyzerHandle) -> Result<()> {
        match analyzer {
            AnalyzerHandle::ClassLevel(class_level) => self.class_level = Some(class_level),
            AnalyzerHandle::NodeCount(node_count) => self.node_count = Some(node_count),
            other => {
                return Err(AnalysisError::UnexpectedAnalyzer {
                    analyzer: self.kind(),
                    given: other.kind(),
                })
            }
        }
        Ok(())
    }
}

struct CohesionPass<'a> {
    class_level: &'a ClassLevelAnalyzer,
    node_count: &'a NodeCountAnalyzer,
    pair_counts: HashMap<NodeId, (u32, u32)>,
    metrics: HashMap<NodeId, Metrics>,
}

impl<'g> GraphVisitor<'g> for CohesionPass<'_> {
    fn visit_type(&mut self, graph: &'g CodeGraph, ty: &'g TypeDecl) {
        if ty.is_interface() {
            return;
        }
        let accesses = property_accesses(graph, ty);
        let props = self.class_level.vars(ty.id);
        let methods = self.node_count.nom(ty.id);
        let nma = accesses.iter().map(BTreeSet::len).sum::<usize>() as f64;

        let lcom_hs = if props * methods > 0.0 {
            1.0 - nma / (props * methods)
        } else {
            0.0
        };
        let lcom_cg = if methods > 1.0 && props > 0.0 {
            (methods - nma / props) / (methods - 1.0)
        } else {
            0.0
        };

        let (conjoint, disjoint) = *self
            .pair_counts
            .entry(ty.id)
            .or_insert_with(|| pair_counts(&accesses));
        let lcom_ck = (disjoint as f64 - conjoint as f64).max(0.0);
        let tcc = if methods > 2.0 {
            ratio(conjoint as f64, methods * (methods - 1.0) / 2.0)
        } else {
            0.0
        };

        self.metrics.insert(
            ty.id,
            to_metrics([
                ("nma", nma),
                ("lcomHS", lcom_hs),
                ("lcomCG", lcom_cg),
                ("lcomCK", lcom_ck),
                ("tcc", tcc),
            ]),
        );
    }
}

/// Unordered method pairs whose property sets intersect, and those that do not.
fn pair_counts(accesses: &[BTreeSet<NodeId>]) -> (u32, u32) {
    let mut conjoint = 0;
    let mut disjoint = 0;
    for (i, first) in accesses.iter().enumerate() {
        for second in &accesses[i + 1..] {
            if first.is_disjoint(second) {
                disjoint += 1;
            } else {
                conjoint += 1;
            }
        }
    }
    (conjoint, disjoint)
}

/// Own properties touched through `self` by each own method, in method order.
fn property_accesses(graph: &CodeGraph, ty: &TypeDecl) -> Vec<BTreeSet<NodeId>> {
    let by_name: HashMap<&str, NodeId> = graph
        .properties_of(ty)
        .map(|p| (p.name.as_str(), p.id))
        .collect();
    graph
        .methods_of(ty)
        .map(|method| {
            SelfAccessCollector::collect(&method.body)
                .into_iter()
                .filter(|access| access.kind == MemberKind::Property)
                .filter_map(|access| by_name.get(access.name.as_str()).copied())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testing::{class_level, cyclomatic, metric, node_count};
    use crate::expr::Expr;
    use crate::types::{TypeKind, Visibility};

    fn wired() -> CohesionAnalyzer {
        let mut analyzer = CohesionAnalyzer::new(&AnalyzerOptions::default());
        analyzer
            .add_analyzer(AnalyzerHandle::ClassLevel(class_level()))
            .unwrap();
        analyzer
            .add_analyzer(AnalyzerHandle::NodeCount(node_count()))
            .unwrap();
        analyzer
    }

    /// Adds a method reading the given properties through `self`.
    fn method(graph: &mut CodeGraph, ty: NodeId, name: &str, reads: &[&str]) {
        let id = graph.add_method(ty, name);
        graph.callable_mut(id).body = reads.iter().map(|p| Expr::self_property(*p)).collect();
    }

    #[test]
    fn test_cohesion_of_mixed_class() {
        let mut graph = CodeGraph::new("shop");
        let pkg = graph.add_package("shop");
        let cart = graph.add_type(pkg, "Cart", TypeKind::Class);
        graph.add_property(cart, "items", Visibility::Private);
        graph.add_property(cart, "total", Visibility::Private);
        method(&mut graph, cart, "add", &["items"]);
        method(&mut graph, cart, "checkout", &["items", "total"]);
        method(&mut graph, cart, "version", &[]);
        method(&mut graph, cart, "discount", &["total"]);

        let mut analyzer = wired();
        analyzer.analyze(&graph).unwrap();
        let m = analyzer.node_metrics(cart);

        assert_eq!(metric(&m, "nma"), 4.0);
        assert_eq!(metric(&m, "lcomHS"), 0.5);
        assert!((metric(&m, "lcomCG") - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(metric(&m, "lcomCK"), 2.0);
        assert!((metric(&m, "tcc") - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(analyzer.pair_counts(cart), Some((2, 4)));
    }

    #[test]
    fn test_boundaries_without_properties_or_enough_methods() {
        let mut graph = CodeGraph::new("app");
        let pkg = graph.add_package("app");
        let stateless = graph.add_type(pkg, "Stateless", TypeKind::Class);
        method(&mut graph, stateless, "a", &[]);
        method(&mut graph, stateless, "b", &[]);
        let pair = graph.add_type(pkg, "Pair", TypeKind::Trait);
        graph.add_property(pair, "left", Visibility::Protected);
        method(&mut graph, pair, "first", &["left"]);
        method(&mut graph, pair, "second", &["left"]);

        let mut analyzer = wired();
        analyzer.analyze(&graph).unwrap();

        let m = analyzer.node_metrics(stateless);
        assert_eq!(metric(&m, "lcomHS"), 0.0);
        assert_eq!(metric(&m, "lcomCG"), 0.0);
        assert_eq!(metric(&m, "tcc"), 0.0);
        assert_eq!(metric(&m, "lcomCK"), 1.0);

        // Sharing pairs outnumber disjoint ones; the difference is floored.
        let m = analyzer.node_metrics(pair);
        assert_eq!(metric(&m, "lcomCK"), 0.0);
        assert_eq!(metric(&m, "lcomHS"), 0.0);
        assert_eq!(metric(&m, "tcc"), 0.0);
    }

    #[test]
    fn test_inherited_properties_are_ignored() {
        let mut graph = CodeGraph::new("app");
        let pkg = graph.add_package("app");
        let base = graph.add_type(pkg, "Base", TypeKind::Class);
        graph.add_property(base, "id", Visibility::Protected);
        let child = graph.add_type(pkg, "Child", TypeKind::Class);
        graph.set_parent(child, base);
        method(&mut graph, child, "identify", &["id"]);

        let mut analyzer = wired();
        analyzer.analyze(&graph).unwrap();
        assert_eq!(metric(&analyzer.node_metrics(child), "nma"), 0.0);
    }

    #[test]
    fn test_missing_dependencies_fail() {
        let graph = CodeGraph::new("empty");
        let mut analyzer = CohesionAnalyzer::new(&AnalyzerOptions::default());
        analyzer
            .add_analyzer(AnalyzerHandle::ClassLevel(class_level()))
            .unwrap();
        let err = analyzer.analyze(&graph).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::MissingAnalyzer {
                analyzer: AnalyzerKind::Cohesion,
                required: AnalyzerKind::NodeCount,
            }
        ));
    }

    #[test]
    fn test_rejects_wrong_dependency() {
        let mut analyzer = CohesionAnalyzer::new(&AnalyzerOptions::default());
        let err = analyzer
            .add_analyzer(AnalyzerHandle::Cyclomatic(cyclomatic()))
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::UnexpectedAnalyzer {
                analyzer: AnalyzerKind::Cohesion,
                given: AnalyzerKind::Cyclomatic,
            }
        ));
    }

    #[test]
    fn test_interfaces_are_skipped() {
        let mut graph = CodeGraph::new("app");
        let pkg = graph.add_package("app");
        let iface = graph.add_type(pkg, "Repository", TypeKind::Interface);
        method(&mut graph, iface, "find", &[]);

        let mut analyzer = wired();
        analyzer.analyze(&graph).unwrap();
        assert!(analyzer.node_metrics(iface).is_empty());
        assert_eq!(analyzer.pair_counts(iface), None);
    }
}
