use crate::ast::Template;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::generate::{Generator, Renderer};
use crate::value::Mapping;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORTAL_NAME: &str = "REGARDS HMI";
pub const DEFAULT_MIN_EODAG_VERSION: &str = "2.8.0";

/// Per-portal identifiers baked into every generated script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalMetadata {
    pub provider: Option<String>,
    pub base_uri: Option<String>,
    pub portal_name: Option<String>,
    pub filename: Option<String>,
    pub api_key_env_var: Option<String>,
    pub stac_search_api: Option<String>,
    pub min_eodag_version: Option<String>,
    pub project_name: Option<String>,
}

impl PortalMetadata {
    /// Fail on the first required field that is absent or blank.
    pub fn validate(&self) -> Result<()> {
        require(&self.filename, "filename")?;
        require(&self.provider, "provider")?;
        require(&self.base_uri, "baseUri")?;
        Ok(())
    }

    /// Template view of the metadata, defaults applied and blank fields left out.
    ///
    /// `filename` is the suggested script filename.
    pub fn to_mapping(&self) -> Mapping {
        let filename = self.script_filename().ok();
        let mut info = Mapping::new();
        let fields = [
            ("provider", present(&self.provider)),
            ("baseUri", present(&self.base_uri)),
            ("portalName", present(&self.portal_name).or(Some(DEFAULT_PORTAL_NAME))),
            ("filename", filename.as_deref()),
            ("apiKeyEnvVar", present(&self.api_key_env_var)),
            ("stacSearchApi", present(&self.stac_search_api)),
            ("minEodagVersion", present(&self.min_eodag_version).or(Some(DEFAULT_MIN_EODAG_VERSION))),
            ("projectName", present(&self.project_name)),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                info.insert(name, value);
            }
        }
        info
    }

    /// Suggested filename; `.py` is appended when missing.
    pub fn script_filename(&self) -> Result<String> {
        let filename = require(&self.filename, "filename")?;
        if filename.ends_with(".py") {
            Ok(filename.to_string())
        } else {
            Ok(format!("{}.py", filename))
        }
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn require<'a>(field: &'a Option<String>, name: &'static str) -> Result<&'a str> {
    present(field).ok_or(Error::MissingMetadataField(name))
}

/// Complete script ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedScript {
    pub filename: String,
    pub code: String,
}

/// Prepends the rendered preamble to a script body.
pub struct Assembler<'t> {
    preamble: &'t Template,
    renderer: Renderer,
}

impl<'t> Assembler<'t> {
    pub fn new(preamble: &'t Template) -> Self {
        Self { preamble, renderer: Renderer::default() }
    }

    pub fn with_renderer(preamble: &'t Template, renderer: Renderer) -> Self {
        Self { preamble, renderer }
    }

    pub fn assemble(&self, body: &str, metadata: &PortalMetadata) -> Result<RenderedScript> {
        metadata.validate()?;
        let filename = metadata.script_filename()?;

        let context = Context::new().with("info", metadata.to_mapping());
        let mut code = self.renderer.generate(self.preamble, &context)?;

        if !code.is_empty() {
            if !code.ends_with('\n') {
                code.push('\n');
            }
            code.push('\n');
        }
        code.push_str(body);
        if !code.ends_with('\n') {
            code.push('\n');
        }

        Ok(RenderedScript { filename, code })
    }
}
