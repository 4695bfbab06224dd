use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analyzers::{
    ClassLevelAnalyzer, CohesionAnalyzer, CouplingAnalyzer, CyclomaticAnalyzer, LocAnalyzer,
    NodeCountAnalyzer,
};
use crate::error::{AnalysisError, Result};
use crate::graph::CodeGraph;
use crate::types::NodeId;

/// Named metric values for one node or for the whole project.
pub type Metrics = BTreeMap<String, f64>;

/// Concrete analyzer kinds known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalyzerKind {
    Loc,
    Cyclomatic,
    NodeCount,
    ClassLevel,
    Cohesion,
    Coupling,
}

impl AnalyzerKind {
    pub const ALL: [AnalyzerKind; 6] = [
        AnalyzerKind::Loc,
        AnalyzerKind::Cyclomatic,
        AnalyzerKind::NodeCount,
        AnalyzerKind::ClassLevel,
        AnalyzerKind::Cohesion,
        AnalyzerKind::Coupling,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AnalyzerKind::Loc => "loc",
            AnalyzerKind::Cyclomatic => "cyclomatic",
            AnalyzerKind::NodeCount => "node-count",
            AnalyzerKind::ClassLevel => "class-level",
            AnalyzerKind::Cohesion => "cohesion",
            AnalyzerKind::Coupling => "coupling",
        }
    }

    /// Alternative spellings accepted on the command line and in config.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            AnalyzerKind::Loc => &["lines", "nodeloc"],
            AnalyzerKind::Cyclomatic => &["ccn", "complexity", "cyclomaticcomplexity"],
            AnalyzerKind::NodeCount => &["nodecount", "count"],
            AnalyzerKind::ClassLevel => &["classlevel", "class"],
            AnalyzerKind::Cohesion => &["lcom"],
            AnalyzerKind::Coupling => &["dependency", "package"],
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name().eq_ignore_ascii_case(name)
            || self.aliases().iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnalyzerKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalyzerKind::ALL
            .into_iter()
            .find(|kind| kind.matches_name(s.trim()))
            .ok_or_else(|| AnalysisError::UnknownAnalyzer(s.to_string()))
    }
}

/// Capability tags used to select analyzers by what they provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Produces per-node metrics.
    NodeMetrics,
    /// Produces project-wide metrics.
    ProjectMetrics,
    /// Needs other analyzers wired in before it can run.
    Aggregate,
    /// Reports package dependency cycles.
    Cycles,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::NodeMetrics,
        Capability::ProjectMetrics,
        Capability::Aggregate,
        Capability::Cycles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::NodeMetrics => "node-metrics",
            Capability::ProjectMetrics => "project-metrics",
            Capability::Aggregate => "aggregate",
            Capability::Cycles => "cycles",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|cap| cap.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AnalysisError::UnknownAnalyzer(s.to_string()))
    }
}

/// Contract shared by every metric analyzer.
pub trait Analyzer {
    fn kind(&self) -> AnalyzerKind;

    /// Compute metrics for the whole graph. Calling it again is a no-op.
    fn analyze(&mut self, graph: &CodeGraph) -> Result<()>;

    /// Metrics for `node`; empty when the analyzer never saw it.
    fn node_metrics(&self, node: NodeId) -> Metrics;

    fn project_metrics(&self) -> Option<Metrics> {
        None
    }

    /// Kinds that must be wired through [`Analyzer::add_analyzer`] first.
    fn required_analyzers(&self) -> &'static [AnalyzerKind] {
        &[]
    }

    fn add_analyzer(&mut self, analyzer: AnalyzerHandle) -> Result<()> {
        Err(AnalysisError::UnexpectedAnalyzer {
            analyzer: self.kind(),
            given: analyzer.kind(),
        })
    }
}

/// Shared reference to one analyzer singleton.
///
/// The variant carries the concrete type so aggregate analyzers can check
/// what they are handed at wiring time.
#[derive(Clone)]
pub enum AnalyzerHandle {
    Loc(Rc<RefCell<LocAnalyzer>>),
    Cyclomatic(Rc<RefCell<CyclomaticAnalyzer>>),
    NodeCount(Rc<RefCell<NodeCountAnalyzer>>),
    ClassLevel(Rc<RefCell<ClassLevelAnalyzer>>),
    Cohesion(Rc<RefCell<CohesionAnalyzer>>),
    Coupling(Rc<RefCell<CouplingAnalyzer>>),
}

impl AnalyzerHandle {
    pub fn kind(&self) -> AnalyzerKind {
        match self {
            AnalyzerHandle::Loc(_) => AnalyzerKind::Loc,
            AnalyzerHandle::Cyclomatic(_) => AnalyzerKind::Cyclomatic,
            AnalyzerHandle::NodeCount(_) => AnalyzerKind::NodeCount,
            AnalyzerHandle::ClassLevel(_) => AnalyzerKind::ClassLevel,
            AnalyzerHandle::Cohesion(_) => AnalyzerKind::Cohesion,
            AnalyzerHandle::Coupling(_) => AnalyzerKind::Coupling,
        }
    }

    fn shared(&self) -> Rc<RefCell<dyn Analyzer>> {
        match self {
            AnalyzerHandle::Loc(a) => a.clone(),
            AnalyzerHandle::Cyclomatic(a) => a.clone(),
            AnalyzerHandle::NodeCount(a) => a.clone(),
            AnalyzerHandle::ClassLevel(a) => a.clone(),
            AnalyzerHandle::Cohesion(a) => a.clone(),
            AnalyzerHandle::Coupling(a) => a.clone(),
        }
    }

    pub fn analyze(&self, graph: &CodeGraph) -> Result<()> {
        self.shared().borrow_mut().analyze(graph)
    }

    pub fn node_metrics(&self, node: NodeId) -> Metrics {
        self.shared().borrow().node_metrics(node)
    }

    pub fn project_metrics(&self) -> Option<Metrics> {
        self.shared().borrow().project_metrics()
    }

    pub fn required_analyzers(&self) -> &'static [AnalyzerKind] {
        self.shared().borrow().required_analyzers()
    }

    pub fn add_analyzer(&self, dependency: AnalyzerHandle) -> Result<()> {
        self.shared().borrow_mut().add_analyzer(dependency)
    }

    /// The coupling analyzer, for callers that need cycle information.
    pub fn as_coupling(&self) -> Option<Rc<RefCell<CouplingAnalyzer>>> {
        match self {
            AnalyzerHandle::Coupling(a) => Some(a.clone()),
            _ => None,
        }
    }

    /// Two handles are the same when they point at the same instance.
    pub fn same_instance(&self, other: &AnalyzerHandle) -> bool {
        Rc::ptr_eq(&self.shared(), &other.shared())
    }
}

impl fmt::Debug for AnalyzerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnalyzerHandle").field(&self.kind()).finish()
    }
}
