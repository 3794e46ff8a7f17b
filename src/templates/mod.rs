//! Template registry.
//!
//! Templates are parsed once when the registry is built and shared read-only
//! afterwards. Built-in templates are compiled into the binary; a directory of
//! `<kind>.py.tmpl` files can replace any of them.

use crate::ast::Template;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};
use walkdir::WalkDir;

const TEMPLATE_SUFFIX: &str = ".py.tmpl";
const PREAMBLE_STEM: &str = "preamble";

const BUILTIN_PREAMBLE: &str = include_str!("../../templates/preamble.py.tmpl");
const BUILTIN_SINGLE: &str = include_str!("../../templates/single_collection.py.tmpl");
const BUILTIN_MULTI: &str = include_str!("../../templates/multi_collection.py.tmpl");
const BUILTIN_BOOTSTRAP: &str = include_str!("../../templates/provider_bootstrap.py.tmpl");

/// Shape of a script request, one template per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    SingleCollection,
    MultiCollection,
    ProviderBootstrap,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 3] = [
        TemplateKind::SingleCollection,
        TemplateKind::MultiCollection,
        TemplateKind::ProviderBootstrap,
    ];

    /// File stem of the template for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::SingleCollection => "single_collection",
            TemplateKind::MultiCollection => "multi_collection",
            TemplateKind::ProviderBootstrap => "provider_bootstrap",
        }
    }

    fn builtin_source(&self) -> &'static str {
        match self {
            TemplateKind::SingleCollection => BUILTIN_SINGLE,
            TemplateKind::MultiCollection => BUILTIN_MULTI,
            TemplateKind::ProviderBootstrap => BUILTIN_BOOTSTRAP,
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "single" | "single_collection" => Ok(TemplateKind::SingleCollection),
            "multi" | "multi_collection" | "multi_collections" => Ok(TemplateKind::MultiCollection),
            "bootstrap" | "provider_bootstrap" => Ok(TemplateKind::ProviderBootstrap),
            _ => Err(Error::UnknownTemplateKind(s.to_string())),
        }
    }
}

/// Parsed preamble plus one body template per kind
#[derive(Debug, Clone)]
pub struct Templates {
    preamble: Template,
    bodies: HashMap<TemplateKind, Template>,
}

impl Templates {
    /// Registry with a preamble and no body templates.
    pub fn new(preamble: Template) -> Self {
        Self { preamble, bodies: HashMap::new() }
    }

    /// Parse the built-in templates.
    pub fn builtin() -> Result<Self> {
        let mut templates = Self::new(Template::parse(&file_name(PREAMBLE_STEM), BUILTIN_PREAMBLE)?);
        for kind in TemplateKind::ALL {
            templates.insert(kind, Template::parse(&file_name(kind.as_str()), kind.builtin_source())?);
        }
        Ok(templates)
    }

    /// Built-in templates, replaced by any `<kind>.py.tmpl` or
    /// `preamble.py.tmpl` found under `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut templates = Self::builtin()?;

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|err| Error::Io {
                path: err.path().unwrap_or(dir).to_path_buf(),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(stem) = name.strip_suffix(TEMPLATE_SUFFIX) else {
                debug!(path = %path.display(), "ignoring non-template file");
                continue;
            };

            let source = fs::read_to_string(path).map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;

            if stem == PREAMBLE_STEM {
                debug!(path = %path.display(), "overriding preamble");
                templates.preamble = Template::parse(name, &source)?;
                continue;
            }

            match stem.parse::<TemplateKind>() {
                Ok(kind) => {
                    debug!(path = %path.display(), kind = %kind, "overriding template");
                    templates.insert(kind, Template::parse(name, &source)?);
                }
                Err(_) => warn!(path = %path.display(), "skipping template with unknown kind"),
            }
        }

        Ok(templates)
    }

    pub fn insert(&mut self, kind: TemplateKind, template: Template) -> Option<Template> {
        self.bodies.insert(kind, template)
    }

    /// Template for `kind`. Never falls back to another kind.
    pub fn select(&self, kind: TemplateKind) -> Result<&Template> {
        self.bodies
            .get(&kind)
            .ok_or_else(|| Error::UnknownTemplateKind(kind.to_string()))
    }

    /// Template for a kind given by name, e.g. `"multi"`.
    pub fn select_named(&self, name: &str) -> Result<&Template> {
        self.select(name.parse()?)
    }

    pub fn preamble(&self) -> &Template {
        &self.preamble
    }
}

fn file_name(stem: &str) -> String {
    format!("{}{}", stem, TEMPLATE_SUFFIX)
}
