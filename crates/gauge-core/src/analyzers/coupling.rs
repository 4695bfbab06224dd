use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use tracing::debug;

use super::{ratio, to_metrics};
use crate::analyzer::{Analyzer, AnalyzerKind, Metrics};
use crate::config::{AnalyzerOptions, CouplingOptions};
use crate::error::Result;
use crate::graph::CodeGraph;
use crate::types::{Callable, NodeId, Package, TypeDecl};
use crate::visitor::{walk_graph, walk_package, walk_type, GraphVisitor};

/// Coupling figures of one package.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PackageStats {
    /// Concrete classes.
    pub cc: u32,
    /// Abstract classes, interfaces and traits.
    pub ac: u32,
    /// Packages depending on this one.
    pub ca: u32,
    /// Packages this one depends on.
    pub ce: u32,
    /// Abstractness `ac / (cc + ac)`; NaN for a package without types.
    pub a: f64,
    /// Instability `ce / (ce + ca)`.
    pub i: f64,
    /// `a + i`.
    pub d: f64,
}

impl PackageStats {
    fn to_metrics(self) -> Metrics {
        to_metrics([
            ("cc", self.cc as f64),
            ("ac", self.ac as f64),
            ("ca", self.ca as f64),
            ("ce", self.ce as f64),
            ("a", self.a),
            ("i", self.i),
            ("d", self.d),
        ])
    }
}

/// Afferent/efferent package coupling and dependency cycles.
///
/// A package depends on another when one of its types extends, implements
/// or references a type of the other package, or one of its callables takes
/// such a type as a parameter or references it. Library stubs, the default
/// package and excluded packages get no figures.
#[derive(Debug)]
pub struct CouplingAnalyzer {
    options: CouplingOptions,
    computed: bool,
    stats: BTreeMap<NodeId, PackageStats>,
    efferent: BTreeMap<NodeId, BTreeSet<NodeId>>,
    afferent: BTreeMap<NodeId, BTreeSet<NodeId>>,
    dependencies: DiGraph<NodeId, ()>,
    index: HashMap<NodeId, NodeIndex>,
}

impl CouplingAnalyzer {
    pub fn new(options: &AnalyzerOptions) -> Self {
        Self {
            options: options.coupling.clone(),
            computed: false,
            stats: BTreeMap::new(),
            efferent: BTreeMap::new(),
            afferent: BTreeMap::new(),
            dependencies: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    pub fn stats(&self, package: NodeId) -> Option<PackageStats> {
        self.stats.get(&package).copied()
    }

    /// Packages `package` depends on, ordered by id.
    pub fn efferents(&self, package: NodeId) -> Vec<NodeId> {
        self.efferent
            .get(&package)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Packages depending on `package`, ordered by id.
    pub fn afferents(&self, package: NodeId) -> Vec<NodeId> {
        self.afferent
            .get(&package)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// A dependency cycle through `package`: the packages on the path from
    /// `package` back to itself, starting with `package`. `None` when no
    /// such path exists.
    pub fn cycle(&self, package: NodeId) -> Option<Vec<NodeId>> {
        let &start = self.index.get(&package)?;
        let mut path = vec![start];
        let mut visited = HashSet::from([start]);
        if self.find_path_back(start, start, &mut path, &mut visited) {
            Some(path.into_iter().map(|idx| self.dependencies[idx]).collect())
        } else {
            None
        }
    }

    /// Groups of packages that depend on each other, each sorted by id.
    pub fn cycles(&self) -> Vec<Vec<NodeId>> {
        let mut groups: Vec<Vec<NodeId>> = petgraph::algo::kosaraju_scc(&self.dependencies)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut group: Vec<NodeId> =
                    scc.iter().map(|&idx| self.dependencies[idx]).collect();
                group.sort();
                group
            })
            .collect();
        groups.sort();
        groups
    }

    fn find_path_back(
        &self,
        start: NodeIndex,
        current: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        let mut next: Vec<NodeIndex> = self.dependencies.neighbors(current).collect();
        next.sort_by_key(|&idx| self.dependencies[idx]);
        for idx in next {
            if idx == start {
                return true;
            }
            if visited.insert(idx) {
                path.push(idx);
                if self.find_path_back(start, idx, path, visited) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    fn node_index(
        graph: &mut DiGraph<NodeId, ()>,
        index: &mut HashMap<NodeId, NodeIndex>,
        package: NodeId,
    ) -> NodeIndex {
        *index
            .entry(package)
            .or_insert_with(|| graph.add_node(package))
    }
}

impl Analyzer for CouplingAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Coupling
    }

    fn analyze(&mut self, graph: &CodeGraph) -> Result<()> {
        if self.computed {
            return Ok(());
        }
        debug!(project = %graph.name, "computing package coupling");

        let mut pass = CouplingPass {
            options: &self.options,
            current: None,
            types: BTreeMap::new(),
            efferent: BTreeMap::new(),
            afferent: BTreeMap::new(),
        };
        walk_graph(&mut pass, graph);

        let mut stats = BTreeMap::new();
        for (&package, &(cc, ac)) in &pass.types {
            let ce = pass.efferent.get(&package).map_or(0, BTreeSet::len) as u32;
            let ca = pass.afferent.get(&package).map_or(0, BTreeSet::len) as u32;
            // Left unguarded on purpose: a package without types reports NaN.
            let a = ac as f64 / (cc + ac) as f64;
            let i = ratio(ce as f64, (ce + ca) as f64);
            stats.insert(
                package,
                PackageStats {
                    cc,
                    ac,
                    ca,
                    ce,
                    a,
                    i,
                    d: a + i,
                },
            );
        }

        let mut dependencies = DiGraph::new();
        let mut index = HashMap::new();
        for (&source, targets) in &pass.efferent {
            let from = Self::node_index(&mut dependencies, &mut index, source);
            for &target in targets {
                let to = Self::node_index(&mut dependencies, &mut index, target);
                dependencies.add_edge(from, to, ());
            }
        }
        debug!(
            packages = stats.len(),
            edges = dependencies.edge_count(),
            "package dependency graph built"
        );

        self.stats = stats;
        self.efferent = pass.efferent;
        self.afferent = pass.afferent;
        self.dependencies = dependencies;
        self.index = index;
        self.computed = true;
        Ok(())
    }

    fn node_metrics(&self, node: NodeId) -> Metrics {
        self.stats
            .get(&node)
            .map(|stats| stats.to_metrics())
            .unwrap_or_default()
    }
}

struct CouplingPass<'a> {
    options: &'a CouplingOptions,
    current: Option<NodeId>,
    /// `(concrete, abstract)` type counts of every visited package.
    types: BTreeMap<NodeId, (u32, u32)>,
    efferent: BTreeMap<NodeId, BTreeSet<NodeId>>,
    afferent: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl CouplingPass<'_> {
    fn is_excluded(&self, package: &Package) -> bool {
        self.options
            .exclude_packages
            .iter()
            .any(|name| *name == package.name)
    }

    fn depend(&mut self, graph: &CodeGraph, target: NodeId) {
        let Some(source) = self.current else {
            return;
        };
        let Some(target) = graph.type_decl(target) else {
            return;
        };
        let target_package = target.package;
        if target_package == source {
            return;
        }
        if graph
            .package(target_package)
            .is_some_and(|p| self.is_excluded(p))
        {
            return;
        }
        self.efferent.entry(source).or_default().insert(target_package);
        self.afferent.entry(target_package).or_default().insert(source);
    }

    fn depend_callable(&mut self, graph: &CodeGraph, callable: &Callable) {
        for target in callable.parameters.iter().filter_map(|p| p.type_ref) {
            self.depend(graph, target);
        }
        for &target in &callable.dependencies {
            self.depend(graph, target);
        }
    }
}

impl<'g> GraphVisitor<'g> for CouplingPass<'_> {
    fn visit_package(&mut self, graph: &'g CodeGraph, package: &'g Package) {
        if !package.is_user_defined() || self.is_excluded(package) {
            return;
        }
        self.current = Some(package.id);
        self.types.insert(package.id, (0, 0));
        walk_package(self, graph, package);
        self.current = None;
    }

    fn visit_type(&mut self, graph: &'g CodeGraph, ty: &'g TypeDecl) {
        if let Some(counts) = self.current.and_then(|p| self.types.get_mut(&p)) {
            if ty.is_concrete() {
                counts.0 += 1;
            } else {
                counts.1 += 1;
            }
        }
        for target in ty.parent.iter().chain(&ty.interfaces).chain(&ty.dependencies) {
            self.depend(graph, *target);
        }
        walk_type(self, graph, ty);
    }

    fn visit_method(&mut self, graph: &'g CodeGraph, method: &'g Callable) {
        self.depend_callable(graph, method);
    }

    fn visit_function(&mut self, graph: &'g CodeGraph, function: &'g Callable) {
        self.depend_callable(graph, function);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testing::metric;
    use crate::types::{Parameter, TypeKind};

    fn analyze(graph: &CodeGraph, options: &AnalyzerOptions) -> CouplingAnalyzer {
        let mut analyzer = CouplingAnalyzer::new(options);
        analyzer.analyze(graph).unwrap();
        analyzer
    }

    #[test]
    fn test_two_package_dependency() {
        let mut graph = CodeGraph::new("app");
        let p1 = graph.add_package("P1");
        let p2 = graph.add_package("P2");
        let a = graph.add_type(p1, "A", TypeKind::Class);
        let b = graph.add_type(p2, "B", TypeKind::Interface);
        graph.add_dependency(a, b);

        let analyzer = analyze(&graph, &AnalyzerOptions::default());
        let m1 = analyzer.node_metrics(p1);
        let m2 = analyzer.node_metrics(p2);

        assert_eq!(metric(&m1, "ce"), 1.0);
        assert_eq!(metric(&m1, "ca"), 0.0);
        assert_eq!(metric(&m2, "ce"), 0.0);
        assert_eq!(metric(&m2, "ca"), 1.0);
        assert_eq!(metric(&m1, "a"), 0.0);
        assert_eq!(metric(&m2, "a"), 1.0);
        assert_eq!(metric(&m1, "i"), 1.0);
        assert_eq!(metric(&m2, "i"), 0.0);
        assert_eq!(metric(&m1, "d"), 1.0);
        assert_eq!(metric(&m1, "cc"), 1.0);
        assert_eq!(metric(&m2, "ac"), 1.0);
        assert_eq!(analyzer.efferents(p1), vec![p2]);
        assert_eq!(analyzer.afferents(p2), vec![p1]);
        assert_eq!(analyzer.cycle(p1), None);
        assert!(analyzer.cycles().is_empty());
    }

    #[test]
    fn test_empty_package_abstractness_is_nan() {
        let mut graph = CodeGraph::new("app");
        let empty = graph.add_package("empty");

        let analyzer = analyze(&graph, &AnalyzerOptions::default());
        let stats = analyzer.stats(empty).unwrap();
        assert!(stats.a.is_nan());
        assert!(stats.d.is_nan());
        assert_eq!(stats.i, 0.0);
    }

    #[test]
    fn test_cycle_through_parameters_and_parents() {
        let mut graph = CodeGraph::new("app");
        let p1 = graph.add_package("orders");
        let p2 = graph.add_package("billing");
        let p3 = graph.add_package("shipping");
        let p4 = graph.add_package("reports");
        let order = graph.add_type(p1, "Order", TypeKind::Class);
        let invoice = graph.add_type(p2, "Invoice", TypeKind::Class);
        let parcel = graph.add_type(p3, "Parcel", TypeKind::Class);
        let summary = graph.add_type(p4, "Summary", TypeKind::Class);

        let bill = graph.add_method(order, "bill");
        graph.callable_mut(bill).parameters.push(Parameter {
            name: "invoice".to_string(),
            type_ref: Some(invoice),
        });
        graph.set_parent(invoice, parcel);
        let ship = graph.add_function(p3, "ship");
        graph.add_dependency(ship, order);
        graph.add_dependency(summary, order);

        let analyzer = analyze(&graph, &AnalyzerOptions::default());
        assert_eq!(analyzer.cycle(p1), Some(vec![p1, p2, p3]));
        assert_eq!(analyzer.cycle(p2), Some(vec![p2, p3, p1]));
        assert_eq!(analyzer.cycle(p4), None);
        assert_eq!(analyzer.cycles(), vec![vec![p1, p2, p3]]);
        assert_eq!(analyzer.afferents(p1), vec![p3, p4]);
    }

    #[test]
    fn test_analyze_twice_is_stable() {
        let mut graph = CodeGraph::new("app");
        let web = graph.add_package("web");
        let core = graph.add_package("core");
        let controller = graph.add_type(web, "Controller", TypeKind::Class);
        let service = graph.add_type(core, "Service", TypeKind::Trait);
        graph.add_dependency(controller, service);
        graph.add_dependency(service, controller);

        let mut analyzer = analyze(&graph, &AnalyzerOptions::default());
        let stats = (analyzer.stats(web), analyzer.stats(core));
        let cycles = analyzer.cycles();
        let edges = analyzer.dependencies.edge_count();

        analyzer.analyze(&graph).unwrap();
        assert_eq!((analyzer.stats(web), analyzer.stats(core)), stats);
        assert_eq!(analyzer.efferents(web), vec![core]);
        assert_eq!(analyzer.afferents(web), vec![core]);
        assert_eq!(analyzer.cycles(), cycles);
        assert_eq!(analyzer.cycles(), vec![vec![web, core]]);
        assert_eq!(analyzer.dependencies.edge_count(), edges);
        assert_eq!(metric(&analyzer.node_metrics(web), "ce"), 1.0);
    }

    #[test]
    fn test_excluded_and_default_packages_are_skipped() {
        let mut graph = CodeGraph::new("app");
        let app = graph.add_package("app");
        let vendor = graph.add_package("vendor");
        let global = graph.add_package(crate::types::DEFAULT_PACKAGE);
        let service = graph.add_type(app, "Service", TypeKind::Class);
        let client = graph.add_type(vendor, "Client", TypeKind::Class);
        let script = graph.add_type(global, "Script", TypeKind::Class);
        graph.add_dependency(service, client);
        graph.add_dependency(script, service);

        let mut options = AnalyzerOptions::default();
        options.coupling.exclude_packages = vec!["vendor".to_string()];
        let analyzer = analyze(&graph, &options);

        assert!(analyzer.stats(vendor).is_none());
        assert!(analyzer.stats(global).is_none());
        assert!(analyzer.node_metrics(vendor).is_empty());
        let stats = analyzer.stats(app).unwrap();
        assert_eq!(stats.ce, 0);
        assert_eq!(stats.ca, 0);
    }

    #[test]
    fn test_library_stubs_count_as_efferent() {
        let mut graph = CodeGraph::new("app");
        let app = graph.add_package("app");
        let stdlib = graph.add_package("std");
        graph.package_mut(stdlib).user_defined = false;
        let handler = graph.add_type(app, "Handler", TypeKind::Class);
        let exception = graph.add_type(stdlib, "Exception", TypeKind::Class);
        graph.set_parent(handler, exception);

        let analyzer = analyze(&graph, &AnalyzerOptions::default());
        assert_eq!(analyzer.stats(app).unwrap().ce, 1);
        assert!(analyzer.stats(stdlib).is_none());
    }
}
