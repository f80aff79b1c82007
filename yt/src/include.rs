//! Recursive include directives
//!
//! The parser surfaces custom tags (`!include`, `!include_dir_list`,
//! `!include_dir_merge_list`, `!include_dir_named`, `!file`) as tagged YAML
//! nodes. The [`YamlLoader`] walks the parsed tree depth-first and replaces
//! each directive with the loaded content, routing every resolved file back
//! through the template-conditional parser.
//!
//! Traversal is synchronous and has no cycle detection; a directory that
//! includes itself will exhaust the stack.

use std::path::{Path, PathBuf};

use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::error::LoadError;
use crate::parser;
use crate::renderer::{TemplateRenderer, TemplateVars};

/// Reserved secrets file, always excluded from directory includes
pub const SECRETS_FILE: &str = "secrets.yaml";

/// Record of one resolved include directive
///
/// serde_yaml drops node marks once a document is parsed, so provenance is
/// tracked per file rather than per line; parse errors still carry their own
/// line and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRecord {
    /// Directive tag, e.g. `!include_dir_list`
    pub directive: &'static str,
    /// File containing the directive
    pub source: PathBuf,
    /// File that was loaded for it
    pub target: PathBuf,
}

/// Loads YAML files, rendering templated ones and resolving include
/// directives against the filesystem
pub struct YamlLoader<R: TemplateRenderer> {
    renderer: R,
    includes: Vec<IncludeRecord>,
}

impl<R: TemplateRenderer> YamlLoader<R> {
    /// Create a loader around a template rendering strategy
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            includes: Vec::new(),
        }
    }

    /// Access the underlying renderer
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Includes resolved since the last [`Self::clear_includes`]
    pub fn includes(&self) -> &[IncludeRecord] {
        &self.includes
    }

    /// Forget accumulated include provenance
    pub fn clear_includes(&mut self) {
        self.includes.clear();
    }

    /// Load a file: template-conditional parse, then resolve every include
    /// directive in the result
    pub fn load(&mut self, path: impl AsRef<Path>, vars: &TemplateVars) -> Result<Value, LoadError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "YamlLoader::load");
        let value = parser::parse_file(path, &self.renderer, vars)?;
        self.resolve(value, path)
    }

    fn resolve(&mut self, value: Value, file: &Path) -> Result<Value, LoadError> {
        match value {
            Value::Tagged(tagged) => self.resolve_tagged(*tagged, file),
            Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve(item, file)?);
                }
                Ok(Value::Sequence(out))
            }
            Value::Mapping(map) => {
                let mut out = Mapping::new();
                for (key, val) in map {
                    out.insert(key, self.resolve(val, file)?);
                }
                Ok(Value::Mapping(out))
            }
            other => Ok(other),
        }
    }

    fn resolve_tagged(&mut self, tagged: TaggedValue, file: &Path) -> Result<Value, LoadError> {
        match tagged.tag.to_string().as_str() {
            "!include" => {
                let (target, args) = directive_target(&tagged.value, file)?;
                self.include_file("!include", target, &args, file)
            }
            "!include_dir_list" => {
                let (dir, args) = directive_target(&tagged.value, file)?;
                let mut items = Vec::new();
                for fname in dir_files(&dir) {
                    items.push(self.include_file("!include_dir_list", fname, &args, file)?);
                }
                Ok(Value::Sequence(items))
            }
            "!include_dir_merge_list" => {
                let (dir, args) = directive_target(&tagged.value, file)?;
                let mut merged = Vec::new();
                for fname in dir_files(&dir) {
                    match self.include_file("!include_dir_merge_list", fname.clone(), &args, file)? {
                        Value::Sequence(items) => merged.extend(items),
                        _ => debug!(path = %fname.display(), "skipping non-list file in merge_list"),
                    }
                }
                Ok(Value::Sequence(merged))
            }
            "!include_dir_named" => {
                let (dir, args) = directive_target(&tagged.value, file)?;
                let mut mapping = Mapping::new();
                for fname in dir_files(&dir) {
                    let stem = fname
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let value = self.include_file("!include_dir_named", fname, &args, file)?;
                    mapping.insert(Value::String(stem), value);
                }
                Ok(Value::Mapping(mapping))
            }
            "!file" => uncache_file(&tagged.value, file),
            // Unknown tags pass through untouched apart from their contents
            _ => {
                let value = self.resolve(tagged.value, file)?;
                Ok(Value::Tagged(Box::new(TaggedValue {
                    tag: tagged.tag,
                    value,
                })))
            }
        }
    }

    fn include_file(
        &mut self,
        directive: &'static str,
        target: PathBuf,
        args: &TemplateVars,
        source: &Path,
    ) -> Result<Value, LoadError> {
        self.includes.push(IncludeRecord {
            directive,
            source: source.to_path_buf(),
            target: target.clone(),
        });

        match self.load(&target, args) {
            Ok(value) => Ok(value),
            Err(e @ LoadError::FileNotFound { .. }) => {
                error!(path = %target.display(), "unable to include file: {e}");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

/// Extract the target path and template arguments from a directive node
///
/// A node is either a bare path string or a `[path, {args}]` sequence; the
/// argument mapping becomes the template variables for the included file.
fn directive_target(node: &Value, file: &Path) -> Result<(PathBuf, TemplateVars), LoadError> {
    let base = file.parent().unwrap_or_else(|| Path::new("."));

    match node {
        Value::String(rel) => Ok((base.join(rel), TemplateVars::new())),
        Value::Sequence(items) => {
            let rel = items.first().and_then(Value::as_str).ok_or_else(|| LoadError::Directive {
                path: file.to_path_buf(),
                reason: "include sequence must start with a path string".to_string(),
            })?;

            let args = match items.get(1) {
                None => TemplateVars::new(),
                Some(Value::Mapping(map)) => mapping_to_vars(map, file)?,
                Some(_) => {
                    return Err(LoadError::Directive {
                        path: file.to_path_buf(),
                        reason: "include arguments must be a mapping".to_string(),
                    });
                }
            };

            Ok((base.join(rel), args))
        }
        _ => Err(LoadError::Directive {
            path: file.to_path_buf(),
            reason: "include target must be a path string".to_string(),
        }),
    }
}

fn mapping_to_vars(map: &Mapping, file: &Path) -> Result<TemplateVars, LoadError> {
    let mut vars = TemplateVars::new();
    for (key, value) in map {
        let key = key.as_str().ok_or_else(|| LoadError::Directive {
            path: file.to_path_buf(),
            reason: "include argument keys must be strings".to_string(),
        })?;
        let value = serde_json::to_value(value).map_err(|e| LoadError::Directive {
            path: file.to_path_buf(),
            reason: format!("include argument {key} is not serializable: {e}"),
        })?;
        vars.insert(key.to_string(), value);
    }
    Ok(vars)
}

/// YAML files directly inside `dir`, sorted by file name, secrets excluded
///
/// A missing or unreadable directory yields an empty list, matching the
/// behavior of scanning an empty one.
fn dir_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), "skipping unreadable directory entry: {e}");
                continue;
            }
        };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        if entry.file_name().to_string_lossy() == SECRETS_FILE {
            continue;
        }
        files.push(path.to_path_buf());
    }
    files
}

/// Rewrite a `!file` path with a cache-busting query parameter
///
/// The file is never read; only the literal path string changes.
fn uncache_file(node: &Value, file: &Path) -> Result<Value, LoadError> {
    let path = node.as_str().ok_or_else(|| LoadError::Directive {
        path: file.to_path_buf(),
        reason: "!file expects a path string".to_string(),
    })?;

    let timestamp = chrono::Utc::now().timestamp_millis();
    let separator = if path.contains('?') { '&' } else { '?' };
    Ok(Value::String(format!("{path}{separator}{timestamp}")))
}
