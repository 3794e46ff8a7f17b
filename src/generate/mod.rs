mod literal;
mod renderer;

pub use literal::{serialize, LiteralForm, UnsupportedValue};
pub use renderer::Renderer;

use crate::ast::Template;
use crate::context::Context;
use crate::error::Result;

/// Render options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Indentation for `tojson` values that do not ask for one themselves
    pub json_indent: Option<usize>,
}

/// Generator trait - turns a parsed template and a context into text
pub trait Generator {
    fn generate(&self, template: &Template, context: &Context) -> Result<String>;
}

/// Render `template` against `context` with default options.
pub fn render(template: &Template, context: &Context) -> Result<String> {
    Renderer::default().generate(template, context)
}
