//! Template rendering strategy
//!
//! The loader does not talk to a template engine directly. It composes with
//! a [`TemplateRenderer`], so hosts can inject their own engine and the
//! loader stays unit-testable in isolation.

use std::sync::RwLock;

use handlebars::Handlebars;
use thiserror::Error;
use tracing::debug;

/// Variables passed to a template render, merged over the process-wide globals
pub type TemplateVars = serde_json::Map<String, serde_json::Value>;

/// Error produced by a template renderer
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TemplateError(pub String);

/// Strategy for rendering a template source with a set of variables
pub trait TemplateRenderer {
    /// Render `source` with `vars` layered over any renderer-wide globals
    fn render(&self, source: &str, vars: &TemplateVars) -> Result<String, TemplateError>;
}

/// Handlebars-backed renderer holding a process-wide globals map
///
/// The globals map is replaced wholesale, never field-mutated, so a render
/// observes either the old globals or the fully-new ones.
pub struct HandlebarsRenderer {
    hbs: Handlebars<'static>,
    globals: RwLock<TemplateVars>,
}

impl HandlebarsRenderer {
    /// Create a renderer with empty globals
    pub fn new() -> Self {
        Self {
            hbs: Handlebars::new(),
            globals: RwLock::new(TemplateVars::new()),
        }
    }

    /// Replace the entire globals map
    pub fn replace_globals(&self, globals: TemplateVars) {
        debug!(keys = globals.len(), "HandlebarsRenderer::replace_globals");
        *self.globals.write().expect("globals lock poisoned") = globals;
    }

    /// Snapshot of the current globals
    pub fn globals(&self) -> TemplateVars {
        self.globals.read().expect("globals lock poisoned").clone()
    }
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, source: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
        let mut data = self.globals.read().expect("globals lock poisoned").clone();
        for (key, value) in vars {
            data.insert(key.clone(), value.clone());
        }

        self.hbs
            .render_template(source, &data)
            .map_err(|e| TemplateError(e.to_string()))
    }
}
