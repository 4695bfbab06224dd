use serde::{Deserialize, Serialize};
use std::fmt;

use crate::expr::Expr;

/// Name of the package that collects declarations without an explicit package.
pub const DEFAULT_PACKAGE: &str = "+global";

/// Identifier of a node in the code graph. Assigned once, never reused.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Line range in a source file, both ends inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start_line: u32,
    pub end_line: u32,
}

impl SourceSpan {
    pub fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    /// Number of physical lines covered by the span.
    pub fn line_count(&self) -> u32 {
        (self.end_line + 1).saturating_sub(self.start_line)
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_line, self.end_line)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn is_public(&self) -> bool {
        *self == Visibility::Public
    }

    pub fn is_private(&self) -> bool {
        *self == Visibility::Private
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Protected => write!(f, "protected"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// Lexical category of a token, as reported by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Comment,
    DocComment,
    Keyword,
    Identifier,
    Literal,
    Operator,
    Punctuation,
}

impl TokenKind {
    pub fn is_comment(&self) -> bool {
        matches!(self, TokenKind::Comment | TokenKind::DocComment)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start_line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, start_line: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            start_line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Interface,
    Trait,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Class => write!(f, "class"),
            TypeKind::Interface => write!(f, "interface"),
            TypeKind::Trait => write!(f, "trait"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallableKind {
    Method,
    Function,
}

/// A package and the declarations it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: NodeId,
    pub name: String,
    #[serde(default = "default_true")]
    pub user_defined: bool,
    #[serde(default)]
    pub types: Vec<NodeId>,
    #[serde(default)]
    pub functions: Vec<NodeId>,
}

impl Package {
    /// Packages that belong to the analyzed code base rather than a library
    /// stub or the synthetic default package.
    pub fn is_user_defined(&self) -> bool {
        self.user_defined && self.name != DEFAULT_PACKAGE
    }
}

/// A class, interface or trait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub id: NodeId,
    pub name: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default = "default_true")]
    pub user_defined: bool,
    pub package: NodeId,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub interfaces: Vec<NodeId>,
    #[serde(default)]
    pub methods: Vec<NodeId>,
    #[serde(default)]
    pub properties: Vec<NodeId>,
    #[serde(default)]
    pub constants: Vec<NodeId>,
    /// Types mentioned by this declaration (parameter, return and thrown
    /// types, instantiations).
    #[serde(default)]
    pub dependencies: Vec<NodeId>,
    #[serde(default)]
    pub file: Option<NodeId>,
    #[serde(default)]
    pub span: SourceSpan,
    #[serde(default)]
    pub tokens: Vec<Token>,
}

impl TypeDecl {
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Concrete classes are non-abstract classes; interfaces and traits count
    /// as abstract.
    pub fn is_concrete(&self) -> bool {
        self.kind == TypeKind::Class && !self.is_abstract
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub type_ref: Option<NodeId>,
}

/// Owner of a callable: methods belong to types, functions to packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum Owner {
    Type(NodeId),
    Package(NodeId),
}

/// A method or a free function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Callable {
    pub id: NodeId,
    pub name: String,
    pub kind: CallableKind,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    pub owner: Owner,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub dependencies: Vec<NodeId>,
    #[serde(default)]
    pub file: Option<NodeId>,
    #[serde(default)]
    pub span: SourceSpan,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub body: Vec<Expr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_static: bool,
    pub owner: NodeId,
    #[serde(default)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constant {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
    pub owner: NodeId,
    #[serde(default)]
    pub span: SourceSpan,
}

/// A compilation unit. Synthetic files carry no name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: NodeId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub line_count: u32,
    #[serde(default)]
    pub tokens: Vec<Token>,
}

/// Every entity stored in the graph arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Package(Package),
    Type(TypeDecl),
    Callable(Callable),
    Property(Property),
    Constant(Constant),
    File(SourceFile),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Package(p) => p.id,
            Node::Type(t) => t.id,
            Node::Callable(c) => c.id,
            Node::Property(p) => p.id,
            Node::Constant(c) => c.id,
            Node::File(f) => f.id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Package(p) => Some(&p.name),
            Node::Type(t) => Some(&t.name),
            Node::Callable(c) => Some(&c.name),
            Node::Property(p) => Some(&p.name),
            Node::Constant(c) => Some(&c.name),
            Node::File(f) => f.name.as_deref(),
        }
    }
}

fn default_true() -> bool {
    true
}
