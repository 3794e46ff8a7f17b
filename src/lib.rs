//! Generates EODAG download scripts for catalog search results.
//!
//! A request names one or more collections plus portal metadata. The matching
//! template is rendered against it, every embedded value passing through the
//! literal serializer, and the result is wrapped with a preamble that guards
//! the installed EODAG version.
//!
//! ```no_run
//! use eodag_script::{ScriptGenerator, ScriptRequest};
//!
//! let request: ScriptRequest = serde_json::from_str(r#"{
//!     "info": {"provider": "regards", "baseUri": "https://catalog.example", "filename": "download.py"},
//!     "parameters": {"productType": "S2_MSI_L1C", "start": "2020-05-01"}
//! }"#)?;
//! let script = ScriptGenerator::builtin()?.generate(&request)?;
//! println!("{}", script.code);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assemble;
pub mod ast;
pub mod context;
pub mod error;
pub mod generate;
pub mod generator;
pub mod parser;
pub mod request;
pub mod syntax;
pub mod templates;
pub mod value;

pub use assemble::{Assembler, PortalMetadata, RenderedScript};
pub use ast::Template;
pub use context::Context;
pub use error::{Error, ErrorKind, ParseError, Result};
pub use generate::{render, serialize, LiteralForm, UnsupportedValue};
pub use generator::{GeneratorOptions, ScriptGenerator};
pub use request::{CollectionParameters, Extent, Parameters, ScriptRequest};
pub use templates::{TemplateKind, Templates};
pub use value::{Geometry, Mapping, Value};
