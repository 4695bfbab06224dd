use std::collections::HashMap;

use tracing::debug;

use super::{content_hash, to_metrics, NodeCache};
use crate::analyzer::{Analyzer, AnalyzerKind, Metrics};
use crate::cache::SharedCache;
use crate::config::AnalyzerOptions;
use crate::error::Result;
use crate::graph::CodeGraph;
use crate::types::{Callable, NodeId, Token, TokenKind};
use crate::visitor::{walk_graph, GraphVisitor};

/// Branching keywords counted by both variants.
const DECISION_KEYWORDS: &[&str] = &["if", "elseif", "for", "foreach", "while", "case", "catch"];

/// Boolean operators counted only by the extended variant.
const BOOLEAN_OPERATORS: &[&str] = &["&&", "||", "and", "or", "xor"];

/// Cyclomatic complexity of one callable: `(ccn, ccn2)`, both starting at 1.
fn complexity(tokens: &[Token]) -> (u32, u32) {
    let mut ccn = 1;
    let mut boolean = 0;
    for token in tokens {
        let text = token.text.as_str();
        match token.kind {
            TokenKind::Keyword if is_one_of(text, DECISION_KEYWORDS) => ccn += 1,
            TokenKind::Operator if text == "?" => ccn += 1,
            TokenKind::Keyword | TokenKind::Operator if is_one_of(text, BOOLEAN_OPERATORS) => {
                boolean += 1
            }
            _ => {}
        }
    }
    (ccn, ccn + boolean)
}

fn is_one_of(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| w.eq_ignore_ascii_case(text))
}

/// McCabe complexity of methods and functions.
///
/// `ccn` counts branching statements and the ternary operator; `ccn2` also
/// counts short-circuit boolean operators. Class-level metrics weigh methods
/// by `ccn2`.
#[derive(Debug)]
pub struct CyclomaticAnalyzer {
    cache: Option<SharedCache>,
    computed: bool,
    node_metrics: HashMap<NodeId, Metrics>,
}

impl CyclomaticAnalyzer {
    pub fn new(options: &AnalyzerOptions) -> Self {
        Self {
            cache: options.cache.clone(),
            computed: false,
            node_metrics: HashMap::new(),
        }
    }

    /// Extended complexity of a callable; 1 when it was never analyzed.
    pub fn ccn2(&self, callable: NodeId) -> f64 {
        self.node_metrics
            .get(&callable)
            .and_then(|m| m.get("ccn2"))
            .copied()
            .unwrap_or(1.0)
    }
}

impl Analyzer for CyclomaticAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Cyclomatic
    }

    fn analyze(&mut self, graph: &CodeGraph) -> Result<()> {
        if self.computed {
            return Ok(());
        }
        debug!(project = %graph.name, "computing cyclomatic complexity");

        let mut pass = ComplexityPass {
            cache: NodeCache::new(self.cache.as_ref(), "ccn"),
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
}

struct ComplexityPass<'a> {
    cache: NodeCache<'a>,
    metrics: HashMap<NodeId, Metrics>,
}

impl ComplexityPass<'_> {
    fn record(&mut self, callable: &Callable) {
        let metrics = self.cache.get_or_compute(
            callable.id,
            || content_hash(callable.span, &callable.tokens),
            || {
                let (ccn, ccn2) = complexity(&callable.tokens);
                to_metrics([("ccn", ccn as f64), ("ccn2", ccn2 as f64)])
            },
        );
        self.metrics.insert(callable.id, metrics);
    }
}

impl<'g> GraphVisitor<'g> for ComplexityPass<'_> {
    fn visit_method(&mut self, _graph: &'g CodeGraph, method: &'g Callable) {
        self.record(method);
    }

    fn visit_function(&mut self, _graph: &'g CodeGraph, function: &'g Callable) {
        self.record(function);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testing::metric;
    use crate::types::TypeKind;

    fn keyword(text: &str) -> Token {
        Token::new(TokenKind::Keyword, text, 1)
    }

    fn operator(text: &str) -> Token {
        Token::new(TokenKind::Operator, text, 1)
    }

    #[test]
    fn test_straight_line_code_is_one() {
        assert_eq!(complexity(&[keyword("return")]), (1, 1));
        assert_eq!(complexity(&[]), (1, 1));
    }

    #[test]
    fn test_branches_and_boolean_operators() {
        let tokens = vec![
            keyword("if"),
            operator("&&"),
            keyword("elseif"),
            keyword("foreach"),
            keyword("OR"),
            operator("?"),
            keyword("catch"),
            operator("??"),
        ];
        // if, elseif, foreach, ?, catch
        assert_eq!(complexity(&tokens), (6, 8));
    }

    #[test]
    fn test_identifiers_named_like_keywords_do_not_count() {
        let tokens = vec![Token::new(TokenKind::Identifier, "if", 1)];
        assert_eq!(complexity(&tokens), (1, 1));
    }

    #[test]
    fn test_analyzer_covers_methods_and_functions() {
        let mut graph = CodeGraph::new("demo");
        let pkg = graph.add_package("app");
        let ty = graph.add_type(pkg, "Router", TypeKind::Class);
        let method = graph.add_method(ty, "dispatch");
        graph.callable_mut(method).tokens = vec![keyword("while"), keyword("case"), keyword("case")];
        let function = graph.add_function(pkg, "main");
        graph.callable_mut(function).tokens = vec![keyword("if"), operator("||")];

        let mut analyzer = CyclomaticAnalyzer::new(&AnalyzerOptions::default());
        analyzer.analyze(&graph).unwrap();

        assert_eq!(metric(&analyzer.node_metrics(method), "ccn"), 4.0);
        assert_eq!(metric(&analyzer.node_metrics(function), "ccn"), 2.0);
        assert_eq!(analyzer.ccn2(function), 3.0);
        assert!(analyzer.node_metrics(ty).is_empty());
        assert_eq!(analyzer.ccn2(NodeId(404)), 1.0);
    }
}
