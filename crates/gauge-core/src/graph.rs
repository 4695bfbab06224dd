use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::types::{
    Callable, CallableKind, Constant, Node, NodeId, Owner, Package, Parameter, Property,
    SourceFile, SourceSpan, Token, TypeDecl, TypeKind, Visibility,
};

/// Arena holding the project: packages, types, callables and members.
///
/// Nodes are addressed by [`NodeId`]; every back-reference (declaring type,
/// owning package, parent type) is an id lookup. Ids are indices into the
/// arena, so they are assigned once and never reused.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeGraph {
    pub name: String,
    packages: Vec<NodeId>,
    nodes: Vec<Node>,
}

impl CodeGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Load a serialized graph produced by a front end.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read code graph '{}'", path.display()))?;
        let graph: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse code graph '{}'", path.display()))?;
        graph.validate()?;
        Ok(graph)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("failed to serialize code graph")?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write code graph '{}'", path.display()))?;
        Ok(())
    }

    /// Check that every node sits at the index matching its id.
    fn validate(&self) -> Result<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id().0 as usize != index {
                anyhow::bail!("node {} is stored at index {index}", node.id());
            }
        }
        Ok(())
    }

    fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len() as u32)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.push(node);
        id
    }

    // --- construction --------------------------------------------------------

    pub fn add_package(&mut self, name: impl Into<String>) -> NodeId {
        let id = self.next_id();
        self.packages.push(id);
        self.push(Node::Package(Package {
            id,
            name: name.into(),
            user_defined: true,
            types: Vec::new(),
            functions: Vec::new(),
        }))
    }

    pub fn add_file(&mut self, name: Option<&str>, line_count: u32, tokens: Vec<Token>) -> NodeId {
        let id = self.next_id();
        self.push(Node::File(SourceFile {
            id,
            name: name.map(str::to_string),
            line_count,
            tokens,
        }))
    }

    /// Add a type to `package`. Panics if `package` is not a package id.
    pub fn add_type(&mut self, package: NodeId, name: impl Into<String>, kind: TypeKind) -> NodeId {
        let id = self.next_id();
        self.push(Node::Type(TypeDecl {
            id,
            name: name.into(),
            kind,
            visibility: Visibility::Public,
            is_abstract: false,
            user_defined: true,
            package,
            parent: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            constants: Vec::new(),
            dependencies: Vec::new(),
            file: None,
            span: SourceSpan::default(),
            tokens: Vec::new(),
        }));
        self.package_mut(package).types.push(id);
        id
    }

    pub fn add_method(&mut self, owner: NodeId, name: impl Into<String>) -> NodeId {
        let id = self.next_id();
        let file = self.type_decl(owner).and_then(|t| t.file);
        self.push(Node::Callable(new_callable(
            id,
            name.into(),
            CallableKind::Method,
            Owner::Type(owner),
            file,
        )));
        self.type_mut(owner).methods.push(id);
        id
    }

    pub fn add_function(&mut self, package: NodeId, name: impl Into<String>) -> NodeId {
        let id = self.next_id();
        self.push(Node::Callable(new_callable(
            id,
            name.into(),
            CallableKind::Function,
            Owner::Package(package),
            None,
        )));
        self.package_mut(package).functions.push(id);
        id
    }

    pub fn add_property(
        &mut self,
        owner: NodeId,
        name: impl Into<String>,
        visibility: Visibility,
    ) -> NodeId {
        let id = self.next_id();
        self.push(Node::Property(Property {
            id,
            name: name.into(),
            visibility,
            is_static: false,
            owner,
            span: SourceSpan::default(),
        }));
        self.type_mut(owner).properties.push(id);
        id
    }

    pub fn add_constant(&mut self, owner: NodeId, name: impl Into<String>) -> NodeId {
        let id = self.next_id();
        self.push(Node::Constant(Constant {
            id,
            name: name.into(),
            visibility: Visibility::Public,
            owner,
            span: SourceSpan::default(),
        }));
        self.type_mut(owner).constants.push(id);
        id
    }

    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) {
        self.type_mut(child).parent = Some(parent);
    }

    pub fn add_interface(&mut self, ty: NodeId, interface: NodeId) {
        self.type_mut(ty).interfaces.push(interface);
    }

    /// Record that `from` (a type or a callable) references type `to`.
    pub fn add_dependency(&mut self, from: NodeId, to: NodeId) {
        match self.nodes.get_mut(from.0 as usize) {
            Some(Node::Type(t)) => t.dependencies.push(to),
            Some(Node::Callable(c)) => c.dependencies.push(to),
            _ => panic!("{from} cannot carry dependencies"),
        }
    }

    /// Move a property to another type, removing it from its previous owner.
    pub fn reparent_property(&mut self, property: NodeId, new_owner: NodeId) {
        let old_owner = match self.nodes.get_mut(property.0 as usize) {
            Some(Node::Property(p)) => std::mem::replace(&mut p.owner, new_owner),
            _ => panic!("{property} is not a property"),
        };
        self.type_mut(old_owner).properties.retain(|&p| p != property);
        self.type_mut(new_owner).properties.push(property);
    }

    /// Mutable access to a type for front ends filling in flags and spans.
    pub fn type_mut(&mut self, id: NodeId) -> &mut TypeDecl {
        match self.nodes.get_mut(id.0 as usize) {
            Some(Node::Type(t)) => t,
            _ => panic!("{id} is not a type"),
        }
    }

    pub fn callable_mut(&mut self, id: NodeId) -> &mut Callable {
        match self.nodes.get_mut(id.0 as usize) {
            Some(Node::Callable(c)) => c,
            _ => panic!("{id} is not a callable"),
        }
    }

    pub fn property_mut(&mut self, id: NodeId) -> &mut Property {
        match self.nodes.get_mut(id.0 as usize) {
            Some(Node::Property(p)) => p,
            _ => panic!("{id} is not a property"),
        }
    }

    pub fn package_mut(&mut self, id: NodeId) -> &mut Package {
        match self.nodes.get_mut(id.0 as usize) {
            Some(Node::Package(p)) => p,
            _ => panic!("{id} is not a package"),
        }
    }

    // --- lookup --------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn package(&self, id: NodeId) -> Option<&Package> {
        match self.node(id) {
            Some(Node::Package(p)) => Some(p),
            _ => None,
        }
    }

    pub fn type_decl(&self, id: NodeId) -> Option<&TypeDecl> {
        match self.node(id) {
            Some(Node::Type(t)) => Some(t),
            _ => None,
        }
    }

    pub fn callable(&self, id: NodeId) -> Option<&Callable> {
        match self.node(id) {
            Some(Node::Callable(c)) => Some(c),
            _ => None,
        }
    }

    pub fn property(&self, id: NodeId) -> Option<&Property> {
        match self.node(id) {
            Some(Node::Property(p)) => Some(p),
            _ => None,
        }
    }

    pub fn constant(&self, id: NodeId) -> Option<&Constant> {
        match self.node(id) {
            Some(Node::Constant(c)) => Some(c),
            _ => None,
        }
    }

    pub fn file(&self, id: NodeId) -> Option<&SourceFile> {
        match self.node(id) {
            Some(Node::File(f)) => Some(f),
            _ => None,
        }
    }

    /// Packages in declaration order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter().filter_map(|&id| self.package(id))
    }

    pub fn types_of<'g>(&'g self, package: &'g Package) -> impl Iterator<Item = &'g TypeDecl> {
        package.types.iter().filter_map(|&id| self.type_decl(id))
    }

    pub fn functions_of<'g>(&'g self, package: &'g Package) -> impl Iterator<Item = &'g Callable> {
        package.functions.iter().filter_map(|&id| self.callable(id))
    }

    pub fn methods_of<'g>(&'g self, ty: &'g TypeDecl) -> impl Iterator<Item = &'g Callable> {
        ty.methods.iter().filter_map(|&id| self.callable(id))
    }

    pub fn properties_of<'g>(&'g self, ty: &'g TypeDecl) -> impl Iterator<Item = &'g Property> {
        ty.properties.iter().filter_map(|&id| self.property(id))
    }

    /// Ancestors of `ty`, nearest first. Assumes an acyclic parent chain.
    pub fn ancestors<'g>(&'g self, ty: &'g TypeDecl) -> Ancestors<'g> {
        Ancestors {
            graph: self,
            next: ty.parent,
        }
    }

    /// Distinct interfaces implemented by `ty`, including those inherited from
    /// ancestors and those extended by other interfaces.
    pub fn all_interfaces(&self, ty: &TypeDecl) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        let mut stack: Vec<NodeId> = std::iter::once(ty)
            .chain(self.ancestors(ty))
            .flat_map(|t| t.interfaces.iter().copied())
            .collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            ordered.push(id);
            if let Some(interface) = self.type_decl(id) {
                stack.extend(interface.interfaces.iter().rev().copied());
            }
        }
        ordered
    }
}

/// Iterator over a type's parent chain.
pub struct Ancestors<'g> {
    graph: &'g CodeGraph,
    next: Option<NodeId>,
}

impl<'g> Iterator for Ancestors<'g> {
    type Item = &'g TypeDecl;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.graph.type_decl(self.next?)?;
        self.next = current.parent;
        Some(current)
    }
}

fn new_callable(
    id: NodeId,
    name: String,
    kind: CallableKind,
    owner: Owner,
    file: Option<NodeId>,
) -> Callable {
    Callable {
        id,
        name,
        kind,
        visibility: Visibility::Public,
        is_static: false,
        is_abstract: false,
        owner,
        parameters: Vec::<Parameter>::new(),
        dependencies: Vec::new(),
        file,
        span: SourceSpan::default(),
        tokens: Vec::new(),
        body: Vec::<Expr>::new(),
    }
}
