use crate::assemble::{Assembler, PortalMetadata, RenderedScript};
use crate::context::Context;
use crate::error::Result;
use crate::generate::{Generator, RenderOptions, Renderer};
use crate::request::ScriptRequest;
use crate::syntax::check_python;
use crate::templates::{TemplateKind, Templates};
use tracing::debug;

/// Generation settings
#[derive(Debug, Clone, Copy)]
pub struct GeneratorOptions {
    /// Parse the finished script and reject it if it is not valid Python
    pub verify_syntax: bool,
    /// Indentation for `tojson` values without an explicit indent
    pub json_indent: Option<usize>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            verify_syntax: true,
            json_indent: None,
        }
    }
}

/// Select, render, assemble and verify in one call.
pub struct ScriptGenerator {
    templates: Templates,
    options: GeneratorOptions,
}

impl ScriptGenerator {
    pub fn new(templates: Templates, options: GeneratorOptions) -> Self {
        Self { templates, options }
    }

    /// Generator over the built-in templates with default options.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(Templates::builtin()?, GeneratorOptions::default()))
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn generate(&self, request: &ScriptRequest) -> Result<RenderedScript> {
        self.generate_as(request.kind(), request)
    }

    /// Generate with an explicit kind instead of the one implied by the request.
    pub fn generate_as(&self, kind: TemplateKind, request: &ScriptRequest) -> Result<RenderedScript> {
        self.render(kind, &request.context_for(kind), &request.info)
    }

    /// Render a prepared context.
    pub fn render(&self, kind: TemplateKind, context: &Context, metadata: &PortalMetadata) -> Result<RenderedScript> {
        metadata.validate()?;

        let renderer = Renderer::new(RenderOptions { json_indent: self.options.json_indent });
        let template = self.templates.select(kind)?;
        let body = renderer.generate(template, context)?;

        let script = Assembler::with_renderer(self.templates.preamble(), renderer).assemble(&body, metadata)?;

        if self.options.verify_syntax {
            check_python(&script.code)?;
        }
        debug!(kind = %kind, filename = %script.filename, bytes = script.code.len(), "generated script");
        Ok(script)
    }
}
