//! Concrete syntax tree
//!
//! A close mirror of the source text: declarations, body entries, symbols and
//! specifier tokens exactly as written. Interpreting them into flags is the
//! semantic builder's job.

/// Byte range and starting line of a node in its source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceTree {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Model(ModelNode),
    Relation(RelationNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    pub comments: Vec<String>,
    pub name: String,
    pub entries: Vec<BodyEntry>,
    pub span: Span,
}

/// One entry of a model body, tagged by what the parser recognized
#[derive(Debug, Clone, PartialEq)]
pub enum BodyEntry {
    Field(FieldNode),
    Composition(CompositionNode),
    Annotation(AnnotationNode),
}

/// A field line, shared by model and relation bodies
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub comments: Vec<String>,
    pub name: String,
    /// Scalar type keyword for model fields, model name for relation fields
    pub ty: String,
    pub symbol: Option<Symbol>,
    pub specifiers: Vec<Specifier>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// `?`
    Nullable,
    /// `[]`
    Array,
    /// `+`
    NoCreate,
    /// `-`
    NoUpdate,
}

/// A specifier keyword, optionally with a parenthesized argument list
#[derive(Debug, Clone, PartialEq)]
pub struct Specifier {
    pub name: String,
    pub args: Vec<Arg>,
}

impl Specifier {
    pub fn keyword(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Int(i64),
    Word(String),
    /// Uninterpreted text, e.g. a regex body
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositionNode {
    pub comments: Vec<String>,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationNode {
    pub name: String,
    pub params: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationNode {
    pub comments: Vec<String>,
    pub fields: Vec<FieldNode>,
    pub span: Span,
}
