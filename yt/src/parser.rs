//! Template-conditional YAML parsing
//!
//! A file is only run through the template engine when its first line starts
//! with the sentinel tag. Everything else is parsed as plain YAML without the
//! engine ever seeing it, which keeps untemplated files with literal braces
//! working and avoids a render pass on the common case.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::{debug, error};

use crate::error::LoadError;
use crate::renderer::{TemplateRenderer, TemplateVars};

/// First-line marker that opts a file into template preprocessing
///
/// Matching is case-insensitive and looks at the first line only.
pub const TEMPLATE_SENTINEL: &str = "# template";

/// Check whether a file's first line carries the template sentinel
pub fn has_sentinel(first_line: &str) -> bool {
    first_line.to_lowercase().starts_with(TEMPLATE_SENTINEL)
}

/// Read a file and parse it as YAML, rendering it first when the sentinel
/// tag is present
///
/// `vars` is only consulted for templated files; the renderer layers it over
/// its own globals. Include directives in the result are left unresolved.
pub fn parse_file<R: TemplateRenderer>(
    path: &Path,
    renderer: &R,
    vars: &TemplateVars,
) -> Result<Value, LoadError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            LoadError::FileNotFound {
                path: path.to_path_buf(),
                source: e,
            }
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let first_line = raw.lines().next().unwrap_or("");
    let text = if has_sentinel(first_line) {
        debug!(path = %path.display(), "rendering templated YAML file");
        renderer.render(&raw, vars).map_err(|e| LoadError::Render {
            path: path.to_path_buf(),
            source: e,
        })?
    } else {
        raw
    };

    match serde_yaml::from_str::<Value>(&text) {
        // An empty document parses to null; callers expect a mapping.
        Ok(Value::Null) => Ok(Value::Mapping(Mapping::new())),
        Ok(value) => Ok(value),
        Err(e) => {
            error!(path = %path.display(), "{e}: {text}");
            Err(LoadError::Parse {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }
}
