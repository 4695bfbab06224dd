use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::analyzer::{AnalyzerHandle, AnalyzerKind, Capability};
use crate::analyzers::{
    ClassLevelAnalyzer, CohesionAnalyzer, CouplingAnalyzer, CyclomaticAnalyzer, LocAnalyzer,
    NodeCountAnalyzer,
};
use crate::config::AnalyzerOptions;
use crate::error::{AnalysisError, Result};
use crate::graph::CodeGraph;

/// One row of the registration table.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub kind: AnalyzerKind,
    pub capabilities: &'static [Capability],
}

impl Registration {
    /// True when `name` is one of the capability tags, the kind name or an
    /// alias, compared case-insensitively.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        self.kind.matches_name(name)
            || self
                .capabilities
                .iter()
                .any(|cap| cap.as_str().eq_ignore_ascii_case(name))
    }
}

const REGISTRATIONS: &[Registration] = &[
    Registration {
        kind: AnalyzerKind::Loc,
        capabilities: &[Capability::NodeMetrics, Capability::ProjectMetrics],
    },
    Registration {
        kind: AnalyzerKind::Cyclomatic,
        capabilities: &[Capability::NodeMetrics],
    },
    Registration {
        kind: AnalyzerKind::NodeCount,
        capabilities: &[Capability::NodeMetrics, Capability::ProjectMetrics],
    },
    Registration {
        kind: AnalyzerKind::ClassLevel,
        capabilities: &[Capability::NodeMetrics, Capability::Aggregate],
    },
    Registration {
        kind: AnalyzerKind::Cohesion,
        capabilities: &[Capability::NodeMetrics, Capability::Aggregate],
    },
    Registration {
        kind: AnalyzerKind::Coupling,
        capabilities: &[Capability::NodeMetrics, Capability::Cycles],
    },
];

fn instantiate(kind: AnalyzerKind, options: &AnalyzerOptions) -> AnalyzerHandle {
    match kind {
        AnalyzerKind::Loc => AnalyzerHandle::Loc(Rc::new(RefCell::new(LocAnalyzer::new(options)))),
        AnalyzerKind::Cyclomatic => {
            AnalyzerHandle::Cyclomatic(Rc::new(RefCell::new(CyclomaticAnalyzer::new(options))))
        }
        AnalyzerKind::NodeCount => {
            AnalyzerHandle::NodeCount(Rc::new(RefCell::new(NodeCountAnalyzer::new(options))))
        }
        AnalyzerKind::ClassLevel => {
            AnalyzerHandle::ClassLevel(Rc::new(RefCell::new(ClassLevelAnalyzer::new(options))))
        }
        AnalyzerKind::Cohesion => {
            AnalyzerHandle::Cohesion(Rc::new(RefCell::new(CohesionAnalyzer::new(options))))
        }
        AnalyzerKind::Coupling => {
            AnalyzerHandle::Coupling(Rc::new(RefCell::new(CouplingAnalyzer::new(options))))
        }
    }
}

/// Turns requested analyzer names and capability tags into wired analyzer
/// instances.
///
/// Instances are created once per kind and shared: an aggregate analyzer
/// and a direct request for its dependency get the same object, so the
/// dependency's results are computed once.
#[derive(Debug)]
pub struct AnalyzerRegistry {
    options: AnalyzerOptions,
    instances: BTreeMap<AnalyzerKind, AnalyzerHandle>,
}

impl AnalyzerRegistry {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self {
            options,
            instances: BTreeMap::new(),
        }
    }

    /// The registration table, in resolution order.
    pub fn registrations() -> &'static [Registration] {
        REGISTRATIONS
    }

    /// Analyzers matching any of `accepted`, deduplicated and in table
    /// order, with every dependency wired.
    pub fn resolve<S: AsRef<str>>(&mut self, accepted: &[S]) -> Result<Vec<AnalyzerHandle>> {
        for name in accepted {
            let name = name.as_ref();
            if !REGISTRATIONS.iter().any(|r| r.matches(name)) {
                return Err(AnalysisError::UnknownAnalyzer(name.to_string()));
            }
        }

        let mut handles = Vec::new();
        for registration in REGISTRATIONS {
            if accepted.iter().any(|name| registration.matches(name.as_ref())) {
                handles.push(self.instance(registration.kind)?);
            }
        }
        Ok(handles)
    }

    /// Resolve `accepted` and analyze every match. Stops at the first error.
    pub fn run<S: AsRef<str>>(
        &mut self,
        graph: &CodeGraph,
        accepted: &[S],
    ) -> Result<Vec<AnalyzerHandle>> {
        let handles = self.resolve(accepted)?;
        for handle in &handles {
            debug!(analyzer = %handle.kind(), "running analyzer");
            handle.analyze(graph)?;
        }
        Ok(handles)
    }

    /// Shared instance of `kind`, created and wired on first use.
    fn instance(&mut self, kind: AnalyzerKind) -> Result<AnalyzerHandle> {
        if let Some(handle) = self.instances.get(&kind) {
            return Ok(handle.clone());
        }
        let handle = instantiate(kind, &self.options);
        for &required in handle.required_analyzers() {
            let dependency = self.instance(required)?;
            debug!(analyzer = %kind, dependency = %required, "wiring analyzer");
            handle.add_analyzer(dependency)?;
        }
        self.instances.insert(kind, handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    fn kinds(handles: &[AnalyzerHandle]) -> Vec<AnalyzerKind> {
        handles.iter().map(AnalyzerHandle::kind).collect()
    }

    #[test]
    fn test_resolve_by_kind_and_alias() {
        let mut registry = AnalyzerRegistry::new(AnalyzerOptions::default());
        let handles = registry.resolve(&["COHESION", "ccn"]).unwrap();
        assert_eq!(
            kinds(&handles),
            vec![AnalyzerKind::Cyclomatic, AnalyzerKind::Cohesion]
        );
    }

    #[test]
    fn test_resolve_by_capability_keeps_table_order() {
        let mut registry = AnalyzerRegistry::new(AnalyzerOptions::default());
        let handles = registry.resolve(&["cycles", "aggregate", "project-metrics"]).unwrap();
        assert_eq!(
            kinds(&handles),
            vec![
                AnalyzerKind::Loc,
                AnalyzerKind::NodeCount,
                AnalyzerKind::ClassLevel,
                AnalyzerKind::Cohesion,
                AnalyzerKind::Coupling,
            ]
        );
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut registry = AnalyzerRegistry::new(AnalyzerOptions::default());
        let handles = registry.resolve(&["loc", "LOC", "lines"]).unwrap();
        assert_eq!(kinds(&handles), vec![AnalyzerKind::Loc]);
    }

    #[test]
    fn test_instances_are_shared_across_resolves() {
        let mut registry = AnalyzerRegistry::new(AnalyzerOptions::default());
        let aggregates = registry.resolve(&["aggregate"]).unwrap();
        // Class-level was created while wiring; a direct request reuses it.
        let class_level = registry.resolve(&["class-level"]).unwrap();
        let cohesion = registry.resolve(&["cohesion"]).unwrap();

        assert!(aggregates[0].same_instance(&class_level[0]));
        assert!(aggregates[1].same_instance(&cohesion[0]));
        assert!(!class_level[0].same_instance(&cohesion[0]));
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let mut registry = AnalyzerRegistry::new(AnalyzerOptions::default());
        let err = registry.resolve(&["loc", "halstead"]).unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownAnalyzer(name) if name == "halstead"));
    }

    #[test]
    fn test_run_wires_and_analyzes_aggregates() {
        let mut graph = CodeGraph::new("app");
        let pkg = graph.add_package("app");
        let ty = graph.add_type(pkg, "Service", TypeKind::Class);
        graph.add_method(ty, "handle");

        let mut registry = AnalyzerRegistry::new(AnalyzerOptions::default());
        let handles = registry.run(&graph, &["cohesion"]).unwrap();
        let metrics = handles[0].node_metrics(ty);
        assert_eq!(metrics.get("lcomCK"), Some(&0.0));

        // The dependency was analyzed by the aggregate itself.
        let class_level = registry.resolve(&["class-level"]).unwrap();
        assert_eq!(class_level[0].node_metrics(ty).get("dit"), Some(&0.0));
    }

    #[test]
    fn test_every_kind_is_registered_once() {
        for kind in AnalyzerKind::ALL {
            let count = AnalyzerRegistry::registrations()
                .iter()
                .filter(|r| r.kind == kind)
                .count();
            assert_eq!(count, 1, "{kind} registered {count} times");
        }
    }
}
