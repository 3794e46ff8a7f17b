pub mod tokenizer;
mod tree_builder;

pub use tokenizer::{tokenize, Position, Span, Token};
use tree_builder::TreeBuilder;

use crate::ast::Template;
use crate::error::{Error, ParseError};
use std::sync::Arc;

/// Parser trait - converts template text to a node tree
pub trait Parser {
    fn parse(&self, name: &str, source: &str) -> Result<Template, ParseError>;
}

/// Parser for the script template language
pub struct TemplateParser {
    // Configuration only, no state
}

impl TemplateParser {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for TemplateParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for TemplateParser {
    fn parse(&self, name: &str, source: &str) -> Result<Template, ParseError> {
        let tokens = tokenize(source)?;

        let source_arc: Arc<str> = Arc::from(source);
        let mut builder = TreeBuilder::new(tokens, source_arc.clone());
        let nodes = builder.build()?;

        Ok(Template::new(name, nodes, source_arc))
    }
}

impl Template {
    /// Parse and validate template text, reporting problems as `MalformedTemplate`.
    pub fn parse(name: &str, source: &str) -> Result<Template, Error> {
        TemplateParser::new()
            .parse(name, source)
            .map_err(|source_error| Error::MalformedTemplate {
                template: name.to_string(),
                text: Arc::from(source),
                source: source_error,
            })
    }
}
