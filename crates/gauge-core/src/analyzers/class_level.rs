use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use super::{ratio, to_metrics, CyclomaticAnalyzer};
use crate::analyzer::{Analyzer, AnalyzerHandle, AnalyzerKind, Metrics};
use crate::config::AnalyzerOptions;
use crate::error::{AnalysisError, Result};
use crate::expr::{MemberKind, SelfAccess, SelfAccessCollector};
use crate::graph::CodeGraph;
use crate::types::{Callable, NodeId, TypeDecl};
use crate::visitor::{walk_graph, GraphVisitor};

/// Structural metrics of classes and traits: inheritance depth, weighted
/// method counts, sizes and inheritance usage.
#[derive(Debug)]
pub struct ClassLevelAnalyzer {
    cyclomatic: Option<Rc<RefCell<CyclomaticAnalyzer>>>,
    computed: bool,
    node_metrics: HashMap<NodeId, Metrics>,
}

impl ClassLevelAnalyzer {
    pub fn new(_options: &AnalyzerOptions) -> Self {
        Self {
            cyclomatic: None,
            computed: false,
            node_metrics: HashMap::new(),
        }
    }

    /// Own property count of a type; 0 when unknown.
    pub fn vars(&self, ty: NodeId) -> f64 {
        self.node_metrics
            .get(&ty)
            .and_then(|m| m.get("vars"))
            .copied()
            .unwrap_or(0.0)
    }
}

impl Analyzer for ClassLevelAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::ClassLevel
    }

    fn analyze(&mut self, graph: &CodeGraph) -> Result<()> {
        if self.computed {
            return Ok(());
        }
        let cyclomatic = self
            .cyclomatic
            .clone()
            .ok_or(AnalysisError::MissingAnalyzer {
                analyzer: AnalyzerKind::ClassLevel,
                required: AnalyzerKind::Cyclomatic,
            })?;
        cyclomatic.borrow_mut().analyze(graph)?;
        debug!(project = %graph.name, "computing class-level metrics");

        let cyclomatic = cyclomatic.borrow();
        let mut pass = ClassPass {
            cyclomatic: &cyclomatic,
            metrics: HashMap::new(),
        };
        walk_graph(&mut pass, graph);

        self.node_metrics = pass.metrics;
        self.computed = true;
        Ok(())
    }

    fn node_metrics(&self, node: NodeId) -> Metrics {
        self.node_metrics.get(&node).cloned().unwrap_or_default()
    }

    fn required_analyzers(&self) -> &'static [AnalyzerKind] {
        &[AnalyzerKind::Cyclomatic]
    }

    fn add_analyzer(&mut self, analyzer: AnalyzerHandle) -> Result<()> {
        match analyzer {
            AnalyzerHandle::Cyclomatic(cyclomatic) => {
                self.cyclomatic = Some(cyclomatic);
                Ok(())
            }
            other => Err(AnalysisError::UnexpectedAnalyzer {
                analyzer: self.kind(),
                given: other.kind(),
            }),
        }
    }
}

struct ClassPass<'a> {
    cyclomatic: &'a CyclomaticAnalyzer,
    metrics: HashMap<NodeId, Metrics>,
}

impl<'g> GraphVisitor<'g> for ClassPass<'_> {
    fn visit_type(&mut self, graph: &'g CodeGraph, ty: &'g TypeDecl) {
        if ty.is_interface() {
            return;
        }
        let metrics = self.measure(graph, ty);
        self.metrics.insert(ty.id, metrics);
    }
}

impl ClassPass<'_> {
    fn measure(&self, graph: &CodeGraph, ty: &TypeDecl) -> Metrics {
        let methods: Vec<&Callable> = graph.methods_of(ty).collect();
        let properties: Vec<_> = graph.properties_of(ty).collect();
        let ancestors: Vec<&TypeDecl> = graph.ancestors(ty).collect();

        let own_methods: HashSet<String> = methods.iter().map(|m| m.name.to_lowercase()).collect();
        let own_properties: HashSet<&str> = properties.iter().map(|p| p.name.as_str()).collect();

        let complexity = |m: &Callable| self.cyclomatic.ccn2(m.id);

        let wmc: f64 = methods.iter().map(|&m| complexity(m)).sum();
        let wmcnp: f64 = methods
            .iter()
            .filter(|m| !m.visibility.is_private())
            .map(|&m| complexity(m))
            .sum();
        let nomnp = methods.iter().filter(|m| !m.visibility.is_private()).count() as f64;
        let vars = properties.len() as f64;
        let varsnp = properties.iter().filter(|p| !p.visibility.is_private()).count() as f64;
        let public_props = properties.iter().filter(|p| p.visibility.is_public()).count() as f64;
        let cis = methods
            .iter()
            .filter(|m| m.visibility.is_public())
            .map(|&m| complexity(m))
            .sum::<f64>()
            + public_props;

        // Non-private members visible from ancestors, nearest declaration first.
        let mut inherited_methods: HashSet<String> = HashSet::new();
        let mut inherited_properties: HashSet<&str> = HashSet::new();
        let mut ancestor_properties: HashSet<&str> = HashSet::new();
        let mut wmci = wmc;
        let mut varsi = vars;
        for ancestor in &ancestors {
            for method in graph.methods_of(ancestor) {
                if method.visibility.is_private() {
                    continue;
                }
                let name = method.name.to_lowercase();
                if !own_methods.contains(&name) && !inherited_methods.contains(&name) {
                    wmci += complexity(method);
                }
                inherited_methods.insert(name);
            }
            for property in graph.properties_of(ancestor) {
                if property.visibility.is_private() {
                    continue;
                }
                let name = property.name.as_str();
                ancestor_properties.insert(name);
                if !own_properties.contains(name) && inherited_properties.insert(name) {
                    varsi += 1.0;
                }
            }
        }

        let overridden = methods
            .iter()
            .filter(|m| inherited_methods.contains(&m.name.to_lowercase()))
            .count() as f64;
        let bovr = ratio(overridden, methods.len() as f64);

        let usage = InheritanceUsage::scan(
            &methods,
            &own_methods,
            &own_properties,
            &inherited_methods,
            &ancestor_properties,
        );

        to_metrics([
            ("dit", ancestors.len() as f64),
            ("impl", graph.all_interfaces(ty).len() as f64),
            ("wmc", wmc),
            ("wmci", wmci),
            ("wmcnp", wmcnp),
            ("cis", cis),
            ("csz", wmc + vars),
            ("vars", vars),
            ("varsi", varsi),
            ("varsnp", varsnp),
            ("nomnp", nomnp),
            ("bovr", bovr),
            ("bur", usage.bur()),
            ("nas", usage.nas as f64),
            ("pnas", ratio(usage.nas as f64, nomnp) * 100.0),
        ])
    }
}

/// How a type's own methods use what they inherit.
///
/// The available sets fill up the first time a method touches `self`, so a
/// public method declared before that point is counted as newly added even
/// when it overrides an inherited one.
#[derive(Debug, Default)]
struct InheritanceUsage {
    available_methods: BTreeSet<String>,
    available_properties: BTreeSet<String>,
    used: BTreeSet<SelfAccess>,
    nas: u32,
}

impl InheritanceUsage {
    fn scan(
        methods: &[&Callable],
        own_methods: &HashSet<String>,
        own_properties: &HashSet<&str>,
        inherited_methods: &HashSet<String>,
        ancestor_properties: &HashSet<&str>,
    ) -> Self {
        let mut usage = Self::default();
        for method in methods {
            let accesses = SelfAccessCollector::collect(&method.body);
            let mut uses_inherited = false;
            if !accesses.is_empty() {
                usage
                    .available_methods
                    .extend(inherited_methods.iter().cloned());
                usage
                    .available_properties
                    .extend(ancestor_properties.iter().map(|p| p.to_string()));

                for access in accesses {
                    let inherited = match access.kind {
                        MemberKind::Method => {
                            let name = access.name.to_lowercase();
                            !own_methods.contains(&name) && inherited_methods.contains(&name)
                        }
                        MemberKind::Property => {
                            let name = access.name.as_str();
                            !own_properties.contains(name) && ancestor_properties.contains(name)
                        }
                    };
                    if inherited {
                        uses_inherited = true;
                        usage.used.insert(SelfAccess {
                            kind: access.kind,
                            name: match access.kind {
                                MemberKind::Method => access.name.to_lowercase(),
                                MemberKind::Property => access.name,
                            },
                        });
                    }
                }
            }

            let name = method.name.to_lowercase();
            if method.visibility.is_public()
                && !usage.available_methods.contains(&name)
                && !uses_inherited
            {
                usage.nas += 1;
            }
        }
        usage
    }

    fn bur(&self) -> f64 {
        ratio(
            self.used.len() as f64,
            (self.available_methods.len() + self.available_properties.len()) as f64,
        )
    }
}
