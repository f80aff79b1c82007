//! Loader error types

use std::path::PathBuf;
use thiserror::Error;

use crate::renderer::TemplateError;

/// Errors that can occur while loading a YAML configuration file
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File not found: {path}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Template render failed for {path}: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },

    #[error("Invalid include directive in {path}: {reason}")]
    Directive { path: PathBuf, reason: String },
}
