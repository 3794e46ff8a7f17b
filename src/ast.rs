use std::fmt;
use std::sync::Arc;

use crate::generate::LiteralForm;

// Re-export Position and Span from tokenizer so the rest of the crate uses a single Span type
pub use crate::parser::tokenizer::{Position, Span};

/// A parsed template, immutable after construction
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub nodes: Vec<Node>,
    pub source: Arc<str>,
}

impl Template {
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, source: Arc<str>) -> Self {
        Self { name: name.into(), nodes, source }
    }
}

/// Template node
#[derive(Debug, Clone)]
pub enum Node {
    Text(TextNode),
    Variable(VariableNode),
    If(IfNode),
    For(ForNode),
}

/// Literal text, emitted verbatim
#[derive(Debug, Clone)]
pub struct TextNode {
    pub content: String,
    pub span: Span,
}

/// `{{ path | filter }}`
#[derive(Debug, Clone)]
pub struct VariableNode {
    pub path: Path,
    pub form: LiteralForm,
    pub span: Span,
}

/// If/elif/else
#[derive(Debug, Clone)]
pub struct IfNode {
    pub condition: Condition,
    pub then_branch: Vec<Node>,
    pub elif_branches: Vec<(Condition, Span, Vec<Node>)>,
    pub else_branch: Option<Vec<Node>>,
    pub span: Span,
}

/// For loop over a sequence
#[derive(Debug, Clone)]
pub struct ForNode {
    pub binding: String,
    pub iterable: Path,
    pub iterable_span: Span,
    pub body: Vec<Node>,
    pub span: Span,
}

/// Presence/truthiness test, optionally negated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub path: Path,
    pub negated: bool,
}

/// Dotted lookup path such as `info.provider` or `loop.last`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub segments: Vec<String>,
}

impl Path {
    /// Parse `a.b.c`; `None` unless every segment is an identifier.
    pub fn parse(text: &str) -> Option<Self> {
        let segments: Vec<String> = text.trim().split('.').map(str::to_string).collect();
        if segments.iter().all(|s| is_identifier(s)) {
            Some(Self { segments })
        } else {
            None
        }
    }

    pub fn root(&self) -> &str {
        &self.segments[0]
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
