//! Body expression trees and the self-access collector.
//!
//! Callables carry a small, language-neutral expression tree. The metrics only
//! care about member accesses whose receiver is the current object (`this`,
//! `self`, `$this`), so the variant set is deliberately narrow:
//!
//! - [`Expr::SelfRef`]: the current object
//! - [`Expr::PropertyAccess`]: `target.name`
//! - [`Expr::MethodCall`]: `target.name(args)`
//! - [`Expr::FunctionCall`]: `name(args)`
//! - [`Expr::Block`]: any compound construct, walked recursively

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    SelfRef,
    Variable {
        name: String,
    },
    Literal {
        value: String,
    },
    PropertyAccess {
        target: Box<Expr>,
        name: String,
    },
    MethodCall {
        target: Box<Expr>,
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    FunctionCall {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Block {
        #[serde(default)]
        children: Vec<Expr>,
    },
}

impl Expr {
    /// `this.name`
    pub fn self_property(name: impl Into<String>) -> Self {
        Expr::PropertyAccess {
            target: Box::new(Expr::SelfRef),
            name: name.into(),
        }
    }

    /// `this.name()`
    pub fn self_call(name: impl Into<String>) -> Self {
        Expr::MethodCall {
            target: Box::new(Expr::SelfRef),
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expr::Variable { name: name.into() }
    }

    pub fn block(children: Vec<Expr>) -> Self {
        Expr::Block { children }
    }
}

/// Kind of member reached through a self access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Property,
    Method,
}

/// A member of the current object referenced from a method body.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelfAccess {
    pub kind: MemberKind,
    pub name: String,
}

/// Read-only traversal over expression trees.
///
/// Each `visit_*` method defaults to walking the node's children, so an
/// implementor only overrides the variants it is interested in.
pub trait ExprVisitor {
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_property_access(&mut self, target: &Expr, _name: &str) {
        self.visit_expr(target);
    }

    fn visit_method_call(&mut self, target: &Expr, _name: &str, args: &[Expr]) {
        self.visit_expr(target);
        for arg in args {
            self.visit_expr(arg);
        }
    }
}

pub fn walk_expr<V: ExprVisitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::SelfRef | Expr::Variable { .. } | Expr::Literal { .. } => {}
        Expr::PropertyAccess { target, name } => visitor.visit_property_access(target, name),
        Expr::MethodCall { target, name, args } => visitor.visit_method_call(target, name, args),
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                visitor.visit_expr(arg);
            }
        }
        Expr::Block { children } => {
            for child in children {
                visitor.visit_expr(child);
            }
        }
    }
}

/// Collects every member accessed through the current object.
#[derive(Debug, Default)]
pub struct SelfAccessCollector {
    accesses: BTreeSet<SelfAccess>,
}

impl SelfAccessCollector {
    /// Collect the distinct self accesses found in `body`.
    pub fn collect(body: &[Expr]) -> BTreeSet<SelfAccess> {
        let mut collector = Self::default();
        for expr in body {
            collector.visit_expr(expr);
        }
        collector.accesses
    }

    fn record(&mut self, kind: MemberKind, name: &str) {
        self.accesses.insert(SelfAccess {
            kind,
            name: name.to_string(),
        });
    }
}

impl ExprVisitor for SelfAccessCollector {
    fn visit_property_access(&mut self, target: &Expr, name: &str) {
        if matches!(target, Expr::SelfRef) {
            self.record(MemberKind::Property, name);
        } else {
            self.visit_expr(target);
        }
    }

    fn visit_method_call(&mut self, target: &Expr, name: &str, args: &[Expr]) {
        if matches!(target, Expr::SelfRef) {
            self.record(MemberKind::Method, name);
        } else {
            self.visit_expr(target);
        }
        for arg in args {
            self.visit_expr(arg);
        }
    }
}
