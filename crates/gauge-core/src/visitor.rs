//! Depth-first traversal over the code graph.
//!
//! Analyzers implement the hooks they care about; the default of every
//! `visit_*` method that has children is to walk them, so an override that
//! still wants the children calls the matching `walk_*` function itself.
//! Children are visited in declaration order.

use crate::graph::CodeGraph;
use crate::types::{Callable, Constant, Package, Property, TypeDecl};

pub trait GraphVisitor<'g> {
    fn visit_package(&mut self, graph: &'g CodeGraph, package: &'g Package) {
        walk_package(self, graph, package);
    }

    fn visit_type(&mut self, graph: &'g CodeGraph, ty: &'g TypeDecl) {
        walk_type(self, graph, ty);
    }

    fn visit_method(&mut self, _graph: &'g CodeGraph, _method: &'g Callable) {}

    fn visit_function(&mut self, _graph: &'g CodeGraph, _function: &'g Callable) {}

    fn visit_property(&mut self, _graph: &'g CodeGraph, _property: &'g Property) {}

    fn visit_constant(&mut self, _graph: &'g CodeGraph, _constant: &'g Constant) {}
}

/// Visit every package of the project in order.
pub fn walk_graph<'g, V: GraphVisitor<'g> + ?Sized>(visitor: &mut V, graph: &'g CodeGraph) {
    for package in graph.packages() {
        visitor.visit_package(graph, package);
    }
}

pub fn walk_package<'g, V: GraphVisitor<'g> + ?Sized>(
    visitor: &mut V,
    graph: &'g CodeGraph,
    package: &'g Package,
) {
    for ty in graph.types_of(package) {
        visitor.visit_type(graph, ty);
    }
    for function in graph.functions_of(package) {
        visitor.visit_function(graph, function);
    }
}

pub fn walk_type<'g, V: GraphVisitor<'g> + ?Sized>(
    visitor: &mut V,
    graph: &'g CodeGraph,
    ty: &'g TypeDecl,
) {
    for method in graph.methods_of(ty) {
        visitor.visit_method(graph, method);
    }
    for property in graph.properties_of(ty) {
        visitor.visit_property(graph, property);
    }
    for constant in ty.constants.iter().filter_map(|&id| graph.constant(id)) {
        visitor.visit_constant(graph, constant);
    }
}
