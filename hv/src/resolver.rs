//! Layered attribute resolution
//!
//! An effective view merges three ordered sources: explicit user settings,
//! platform registry data, and computed defaults. Views are recomputed on
//! every access rather than cached; platform registries mutate
//! asynchronously and a stale cache would misattribute areas and names.
//! Registry sizes are hundreds of objects, so recomputation stays cheap.

use regex::Regex;
use serde::Serialize;
use serde_json::{Value as Json, json};
use tracing::debug;

use crate::error::SettingsError;
use crate::model::{AreaEntry, DEFAULT_AREA_ICON, DEFAULT_SORT_ORDER, RegistryContext};

/// Effective view of an area
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaView {
    pub id: String,
    pub name: String,
    pub original_name: String,
    pub icon: String,
    pub sort_order: i64,
    pub visible: bool,
}

impl AreaView {
    /// Keyed accessor over the fixed field set
    pub fn get(&self, field: &str) -> Option<Json> {
        match field {
            "id" => Some(json!(self.id)),
            "name" => Some(json!(self.name)),
            "original_name" => Some(json!(self.original_name)),
            "icon" => Some(json!(self.icon)),
            "sort_order" => Some(json!(self.sort_order)),
            "visible" => Some(json!(self.visible)),
            _ => None,
        }
    }
}

/// Effective view of an entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    pub entity_id: String,
    pub area_id: Option<String>,
    pub original_area_id: Option<String>,
    pub name: String,
    pub domain: String,
    pub entity_type: String,
    pub original_entity_type: String,
    pub sort_order: i64,
    pub visible: bool,
    pub disabled: bool,
}

impl EntityView {
    /// Keyed accessor over the fixed field set
    pub fn get(&self, field: &str) -> Option<Json> {
        match field {
            "entity_id" => Some(json!(self.entity_id)),
            "area_id" => Some(json!(self.area_id)),
            "original_area_id" => Some(json!(self.original_area_id)),
            "name" => Some(json!(self.name)),
            "domain" => Some(json!(self.domain)),
            "entity_type" => Some(json!(self.entity_type)),
            "original_entity_type" => Some(json!(self.original_entity_type)),
            "sort_order" => Some(json!(self.sort_order)),
            "visible" => Some(json!(self.visible)),
            "disabled" => Some(json!(self.disabled)),
            _ => None,
        }
    }
}

/// Effective view of a person
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonView {
    pub id: String,
    pub name: String,
    pub original_name: String,
    pub sort_order: i64,
    pub visible: bool,
}

impl PersonView {
    /// Keyed accessor over the fixed field set
    pub fn get(&self, field: &str) -> Option<Json> {
        match field {
            "id" => Some(json!(self.id)),
            "name" => Some(json!(self.name)),
            "original_name" => Some(json!(self.original_name)),
            "sort_order" => Some(json!(self.sort_order)),
            "visible" => Some(json!(self.visible)),
            _ => None,
        }
    }
}

/// One row of the entity-type inference table
///
/// Rules are evaluated top-down: a device-class row wins over the domain
/// default row below it, and an unmatched domain falls back to the bare
/// domain string.
#[derive(Debug, Clone, Copy)]
pub struct TypeRule {
    pub domain: &'static str,
    pub device_class: Option<&'static str>,
    pub entity_type: &'static str,
}

/// Domain and device-class rules for original entity types
pub const TYPE_RULES: &[TypeRule] = &[
    TypeRule {
        domain: "binary_sensor",
        device_class: Some("motion"),
        entity_type: "motion",
    },
    TypeRule {
        domain: "binary_sensor",
        device_class: Some("door"),
        entity_type: "door",
    },
    TypeRule {
        domain: "binary_sensor",
        device_class: Some("window"),
        entity_type: "window",
    },
    TypeRule {
        domain: "binary_sensor",
        device_class: None,
        entity_type: "binary_sensor",
    },
    TypeRule {
        domain: "cover",
        device_class: Some("garage"),
        entity_type: "garage_door",
    },
    TypeRule {
        domain: "cover",
        device_class: None,
        entity_type: "cover",
    },
    TypeRule {
        domain: "sensor",
        device_class: Some("temperature"),
        entity_type: "temperature",
    },
    TypeRule {
        domain: "sensor",
        device_class: Some("humidity"),
        entity_type: "humidity",
    },
    TypeRule {
        domain: "sensor",
        device_class: None,
        entity_type: "sensor",
    },
];

/// Distinct entity types the inference table can produce
pub fn entity_type_catalog() -> Vec<&'static str> {
    let mut types = Vec::new();
    for rule in TYPE_RULES {
        if !types.contains(&rule.entity_type) {
            types.push(rule.entity_type);
        }
    }
    types
}

/// Split an entity id into its domain and object id
pub fn split_entity_id(entity_id: &str) -> (&str, &str) {
    match entity_id.split_once('.') {
        Some((domain, object_id)) => (domain, object_id),
        None => ("", entity_id),
    }
}

fn title_case(object_id: &str) -> String {
    object_id
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Entity type from the rule table, falling back to the bare domain
pub fn original_entity_type(domain: &str, device_class: Option<&str>) -> String {
    for rule in TYPE_RULES {
        if rule.domain != domain {
            continue;
        }
        match rule.device_class {
            Some(class) => {
                if Some(class) == device_class {
                    return rule.entity_type.to_string();
                }
            }
            // Domain default row; device-class rows sort above it
            None => return rule.entity_type.to_string(),
        }
    }
    domain.to_string()
}

/// Infer an area for an entity by matching area names against the start of
/// its object id
///
/// Each area name is normalized (lowercase, spaces to underscores) and
/// tried in two apostrophe variants, removed and replaced by underscore.
/// The pattern is anchored: the object id must start with an optional
/// `all_` prefix, then the normalized name, then an underscore or end of
/// string. Areas are scanned in name order, first match wins.
pub fn infer_area_id(ctx: &RegistryContext, object_id: &str) -> Option<String> {
    for area in ctx.areas() {
        let name = area.name.to_lowercase().replace(' ', "_");
        let stripped = regex::escape(&name.replace('\'', ""));
        let underscored = regex::escape(&name.replace('\'', "_"));
        let pattern = format!("^(all_)?({stripped}|{underscored})(_|$)");

        match Regex::new(&pattern) {
            Ok(re) => {
                if re.is_match(object_id) {
                    debug!(object_id, area_id = %area.id, "inferred area from entity id");
                    return Some(area.id.clone());
                }
            }
            Err(e) => {
                // Escaped input, so this is unreachable in practice
                debug!(area = %area.name, "skipping unbuildable area pattern: {e}");
            }
        }
    }
    None
}

/// Compute the effective view of an area
pub fn resolve_area(ctx: &RegistryContext, area_id: &str) -> Result<AreaView, SettingsError> {
    let entry = ctx
        .area(area_id)
        .ok_or_else(|| SettingsError::AreaNotFound(area_id.to_string()))?;
    Ok(area_view(ctx, entry))
}

/// Effective view for a known area entry (used when listing)
pub fn area_view(ctx: &RegistryContext, entry: &AreaEntry) -> AreaView {
    let settings = ctx.area_settings.get(&entry.id);

    AreaView {
        id: entry.id.clone(),
        name: settings
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| entry.name.clone()),
        original_name: entry.name.clone(),
        icon: settings
            .and_then(|s| s.icon.clone())
            .unwrap_or_else(|| DEFAULT_AREA_ICON.to_string()),
        sort_order: settings.and_then(|s| s.sort_order).unwrap_or(DEFAULT_SORT_ORDER),
        visible: settings.and_then(|s| s.visible).unwrap_or(true),
    }
}

/// Compute the effective view of an entity
///
/// Fails only when the entity is known to neither the state machine nor
/// the entity registry.
pub fn resolve_entity(ctx: &RegistryContext, entity_id: &str) -> Result<EntityView, SettingsError> {
    let entry = ctx.entity(entity_id);
    let state = ctx.state(entity_id);

    if entry.is_none() && state.is_none() {
        return Err(SettingsError::EntityNotFound(entity_id.to_string()));
    }

    let (domain, object_id) = split_entity_id(entity_id);
    let settings = ctx.entity_settings.get(entity_id);
    let device = entry
        .and_then(|e| e.device_id.as_deref())
        .and_then(|id| ctx.device(id));

    let original_area_id = entry
        .and_then(|e| e.area_id.clone())
        .or_else(|| device.and_then(|d| d.area_id.clone()));

    let area_id = settings
        .and_then(|s| s.area_id.clone())
        .or_else(|| original_area_id.clone())
        .or_else(|| infer_area_id(ctx, object_id));

    let name = state
        .and_then(|s| s.friendly_name())
        .map(str::to_string)
        .unwrap_or_else(|| title_case(object_id));

    let original_type = original_entity_type(domain, state.and_then(|s| s.device_class()));

    Ok(EntityView {
        entity_id: entity_id.to_string(),
        area_id,
        original_area_id,
        name,
        domain: domain.to_string(),
        entity_type: settings
            .and_then(|s| s.entity_type.clone())
            .unwrap_or_else(|| original_type.clone()),
        original_entity_type: original_type,
        sort_order: settings.and_then(|s| s.sort_order).unwrap_or(DEFAULT_SORT_ORDER),
        visible: settings.and_then(|s| s.visible).unwrap_or(true),
        disabled: entry.map(|e| e.disabled).unwrap_or(false),
    })
}

/// Compute the effective view of a person
pub fn resolve_person(ctx: &RegistryContext, person_id: &str) -> Result<PersonView, SettingsError> {
    let entry = ctx
        .person(person_id)
        .ok_or_else(|| SettingsError::PersonNotFound(person_id.to_string()))?;
    let settings = ctx.person_settings.get(person_id);

    Ok(PersonView {
        id: entry.id.clone(),
        name: settings
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| entry.name.clone()),
        original_name: entry.name.clone(),
        sort_order: settings.and_then(|s| s.sort_order).unwrap_or(DEFAULT_SORT_ORDER),
        visible: settings.and_then(|s| s.visible).unwrap_or(true),
    })
}

/// All areas in name order, hidden ones filtered unless requested
pub fn all_areas(ctx: &RegistryContext, include_hidden: bool) -> Vec<AreaView> {
    ctx.areas()
        .iter()
        .map(|entry| area_view(ctx, entry))
        .filter(|area| include_hidden || area.visible)
        .collect()
}

/// All entities with a live state, hidden and disabled ones filtered
/// unless requested
pub fn all_entities(ctx: &RegistryContext, include_hidden: bool, include_disabled: bool) -> Vec<EntityView> {
    ctx.states
        .keys()
        .filter_map(|entity_id| resolve_entity(ctx, entity_id).ok())
        .filter(|e| (include_hidden || e.visible) && (include_disabled || !e.disabled))
        .collect()
}

/// All persons, hidden ones filtered unless requested
pub fn all_persons(ctx: &RegistryContext, include_hidden: bool) -> Vec<PersonView> {
    ctx.persons
        .iter()
        .filter_map(|entry| resolve_person(ctx, &entry.id).ok())
        .filter(|p| include_hidden || p.visible)
        .collect()
}
