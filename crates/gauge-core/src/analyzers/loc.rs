use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::{content_hash, to_metrics, NodeCache};
use crate::analyzer::{Analyzer, AnalyzerKind, Metrics};
use crate::cache::SharedCache;
use crate::config::AnalyzerOptions;
use crate::error::Result;
use crate::graph::CodeGraph;
use crate::types::{Callable, Constant, NodeId, Property, SourceSpan, Token, TypeDecl};
use crate::visitor::{walk_graph, walk_type, GraphVisitor};

/// Line counts of one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LineCounts {
    loc: u64,
    cloc: u64,
    eloc: u64,
}

impl LineCounts {
    fn ncloc(&self) -> f64 {
        self.loc as f64 - self.cloc as f64
    }

    fn to_metrics(self) -> Metrics {
        to_metrics([
            ("loc", self.loc as f64),
            ("cloc", self.cloc as f64),
            ("eloc", self.eloc as f64),
            ("ncloc", self.ncloc()),
        ])
    }

    fn from_metrics(metrics: &Metrics) -> Self {
        let get = |key: &str| metrics.get(key).copied().unwrap_or(0.0) as u64;
        Self {
            loc: get("loc"),
            cloc: get("cloc"),
            eloc: get("eloc"),
        }
    }
}

/// Count comment and non-comment lines touched by `tokens`.
///
/// A token spans as many lines as its trimmed text has; each line is recorded
/// in the set of its category. A line holding both code and a comment lands
/// in both sets.
fn classify_lines(tokens: &[Token]) -> (u64, u64) {
    let mut comment_lines = HashSet::new();
    let mut code_lines = HashSet::new();
    for token in tokens {
        let lines = if token.kind.is_comment() {
            &mut comment_lines
        } else {
            &mut code_lines
        };
        let spanned = token.text.trim().split('\n').count() as u32;
        lines.extend((0..spanned).map(|i| token.start_line + i));
    }
    (comment_lines.len() as u64, code_lines.len() as u64)
}

fn count_declaration(span: SourceSpan, tokens: &[Token]) -> LineCounts {
    let (cloc, eloc) = classify_lines(tokens);
    LineCounts {
        loc: span.line_count() as u64,
        cloc,
        eloc,
    }
}

/// Lines of code per type, callable and file, plus project totals summed
/// over files.
#[derive(Debug)]
pub struct LocAnalyzer {
    cache: Option<SharedCache>,
    computed: bool,
    node_metrics: HashMap<NodeId, Metrics>,
    project_metrics: Metrics,
}

impl LocAnalyzer {
    pub fn new(options: &AnalyzerOptions) -> Self {
        Self {
            cache: options.cache.clone(),
            computed: false,
            node_metrics: HashMap::new(),
            project_metrics: Metrics::new(),
        }
    }
}

impl Analyzer for LocAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Loc
    }

    fn analyze(&mut self, graph: &CodeGraph) -> Result<()> {
        if self.computed {
            return Ok(());
        }
        debug!(project = %graph.name, "counting lines of code");

        let mut pass = LocPass {
            cache: NodeCache::new(self.cache.as_ref(), "loc"),
            metrics: HashMap::new(),
            visited_files: HashSet::new(),
            totals: LineCounts::default(),
        };
        walk_graph(&mut pass, graph);

        self.node_metrics = pass.metrics;
        self.project_metrics = pass.totals.to_metrics();
        self.computed = true;
        debug!(nodes = self.node_metrics.len(), "lines of code counted");
        Ok(())
    }

    fn node_metrics(&self, node: NodeId) -> Metrics {
        self.node_metrics.get(&node).cloned().unwrap_or_default()
    }

    fn project_metrics(&self) -> Option<Metrics> {
        Some(self.project_metrics.clone())
    }
}

struct LocPass<'a> {
    cache: NodeCache<'a>,
    metrics: HashMap<NodeId, Metrics>,
    visited_files: HashSet<NodeId>,
    totals: LineCounts,
}

impl LocPass<'_> {
    /// Count a file the first time a declaration inside it is reached.
    fn visit_file(&mut self, graph: &CodeGraph, file: Option<NodeId>) {
        let Some(file) = file.and_then(|id| graph.file(id)) else {
            return;
        };
        if file.name.is_none() || !self.visited_files.insert(file.id) {
            return;
        }
        let metrics = self.cache.get_or_compute(
            file.id,
            || {
                content_hash(
                    SourceSpan::new(1, file.line_count),
                    &file.tokens,
                )
            },
            || {
                let (cloc, eloc) = classify_lines(&file.tokens);
                LineCounts {
                    loc: file.line_count as u64,
                    cloc,
                    eloc,
                }
                .to_metrics()
            },
        );
        let counts = LineCounts::from_metrics(&metrics);
        self.totals.loc += counts.loc;
        self.totals.cloc += counts.cloc;
        self.totals.eloc += counts.eloc;
        self.metrics.insert(file.id, metrics);
    }

    fn record_declaration(&mut self, id: NodeId, span: SourceSpan, tokens: &[Token]) {
        let metrics = self.cache.get_or_compute(
            id,
            || content_hash(span, tokens),
            || count_declaration(span, tokens).to_metrics(),
        );
        self.metrics.insert(id, metrics);
    }

    fn record_fixed(&mut self, id: NodeId) {
        let fixed = LineCounts {
            loc: 1,
            cloc: 0,
            eloc: 0,
        };
        self.metrics.insert(id, fixed.to_metrics());
    }
}

impl<'g> GraphVisitor<'g> for LocPass<'_> {
    fn visit_type(&mut self, graph: &'g CodeGraph, ty: &'g TypeDecl) {
        self.visit_file(graph, ty.file);
        self.record_declaration(ty.id, ty.span, &ty.tokens);
        walk_type(self, graph, ty);
    }

    fn visit_method(&mut self, graph: &'g CodeGraph, method: &'g Callable) {
        self.visit_file(graph, method.file);
        self.record_declaration(method.id, method.span, &method.tokens);
    }

    fn visit_function(&mut self, graph: &'g CodeGraph, function: &'g Callable) {
        self.visit_file(graph, function.file);
        self.record_declaration(function.id, function.span, &function.tokens);
    }

    fn visit_property(&mut self, _graph: &'g CodeGraph, property: &'g Property) {
        self.record_fixed(property.id);
    }

    fn visit_constant(&mut self, _graph: &'g CodeGraph, constant: &'g Constant) {
        self.record_fixed(constant.id);
    }
}
