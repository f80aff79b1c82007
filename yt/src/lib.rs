//! yamltpl - template-aware YAML loading
//!
//! Configuration files are plain YAML unless their first line carries the
//! [`TEMPLATE_SENTINEL`] tag, in which case the whole file is rendered
//! through a [`TemplateRenderer`] before parsing. Parsed documents may use
//! the `!include` family of directives to compose a configuration out of a
//! filesystem tree; [`YamlLoader`] resolves them recursively.
//!
//! # Modules
//!
//! - [`renderer`] - injectable template rendering strategy
//! - [`parser`] - template-conditional file parsing
//! - [`include`] - recursive include directive resolution
//! - [`error`] - load error taxonomy

pub mod error;
pub mod include;
pub mod parser;
pub mod renderer;

pub use error::LoadError;
pub use include::{IncludeRecord, SECRETS_FILE, YamlLoader};
pub use parser::{TEMPLATE_SENTINEL, has_sentinel, parse_file};
pub use renderer::{HandlebarsRenderer, TemplateError, TemplateRenderer, TemplateVars};
