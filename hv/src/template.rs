//! Template variable export
//!
//! Dashboards render their config through templates; this module projects
//! the resolved views into the renderer's global variables. Globals are
//! rebuilt from scratch and replaced wholesale whenever the context
//! changes, so templates never see a half-updated world.

use serde_json::json;
use tracing::debug;
use yamltpl::{HandlebarsRenderer, TemplateVars};

use crate::model::RegistryContext;
use crate::resolver::{all_areas, all_entities, all_persons};

/// Build the global variable map from a context snapshot
///
/// Only visible areas, entities, and persons are exported; disabled
/// entities are skipped too. Templates that need hidden objects query the
/// service directly.
pub fn template_globals(ctx: &RegistryContext) -> TemplateVars {
    let areas = all_areas(ctx, false);
    let entities = all_entities(ctx, false, false);
    let persons = all_persons(ctx, false);

    debug!(
        areas = areas.len(),
        entities = entities.len(),
        persons = persons.len(),
        "rebuilding template globals"
    );

    let mut vars = TemplateVars::new();
    vars.insert("areas".to_string(), json!(areas));
    vars.insert("entities".to_string(), json!(entities));
    vars.insert("persons".to_string(), json!(persons));
    vars
}

/// Recompute globals from the context and swap them into the renderer
pub fn refresh_globals(renderer: &HandlebarsRenderer, ctx: &RegistryContext) {
    renderer.replace_globals(template_globals(ctx));
}
