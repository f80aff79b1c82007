//! Settings mutation engine
//!
//! An update flows through validate, per-field diff, compact, store. Fields
//! arrive as raw JSON values from a service call: a missing field means
//! "leave alone", an empty string or null means "reset to default". A value
//! equal to its default is never persisted, and an entry whose last field is
//! removed disappears entirely, so storage never holds redundant data.
//!
//! These functions only mutate the in-memory registry; persisting and event
//! emission happen in the service layer, and only when a diff reports a
//! change.

use serde::Deserialize;
use serde_json::Value as Json;
use tracing::debug;

use crate::error::SettingsError;
use crate::model::{
    AreaSettingsRegistry, DEFAULT_AREA_ICON, DEFAULT_SORT_ORDER, EntitySettingsRegistry, PersonSettingsRegistry,
    RegistryContext, SORT_ORDER_MAX, SORT_ORDER_MIN,
};
use crate::resolver::{resolve_area, resolve_entity, resolve_person};

/// Update payload for area settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AreaSettingsUpdate {
    pub area_id: String,
    #[serde(default)]
    pub name: Option<Json>,
    #[serde(default)]
    pub icon: Option<Json>,
    #[serde(default)]
    pub sort_order: Option<Json>,
    #[serde(default)]
    pub visible: Option<Json>,
}

/// Update payload for entity settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntitySettingsUpdate {
    pub entity_id: String,
    #[serde(default)]
    pub area_id: Option<Json>,
    #[serde(default)]
    pub entity_type: Option<Json>,
    #[serde(default)]
    pub sort_order: Option<Json>,
    #[serde(default)]
    pub visible: Option<Json>,
}

/// Update payload for person settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonSettingsUpdate {
    pub id: String,
    #[serde(default)]
    pub name: Option<Json>,
    #[serde(default)]
    pub sort_order: Option<Json>,
    #[serde(default)]
    pub visible: Option<Json>,
}

/// Coerce an incoming string field; null and "" mean reset
fn coerce_string(field: &'static str, value: &Json) -> Result<Option<String>, SettingsError> {
    match value {
        Json::Null => Ok(None),
        Json::String(s) if s.is_empty() => Ok(None),
        Json::String(s) => Ok(Some(s.clone())),
        other => Err(SettingsError::validation(field, format!("expected a string, got {other}"))),
    }
}

/// Coerce an icon; must look like `prefix:name`
fn coerce_icon(field: &'static str, value: &Json) -> Result<Option<String>, SettingsError> {
    match coerce_string(field, value)? {
        Some(icon) if !icon.contains(':') => Err(SettingsError::validation(
            field,
            format!("'{icon}' is not of the form prefix:name"),
        )),
        other => Ok(other),
    }
}

/// Coerce a sort order; numeric strings are converted, the result must lie
/// within the configured range and is truncated to an integer
fn coerce_sort_order(field: &'static str, value: &Json) -> Result<Option<i64>, SettingsError> {
    let number = match value {
        Json::Null => return Ok(None),
        Json::String(s) if s.is_empty() => return Ok(None),
        Json::String(s) => s
            .parse::<f64>()
            .map_err(|_| SettingsError::validation(field, format!("'{s}' is not a number")))?,
        Json::Number(n) => n
            .as_f64()
            .ok_or_else(|| SettingsError::validation(field, format!("'{n}' is not a number")))?,
        other => Err(SettingsError::validation(
            field,
            format!("expected a number, got {other}"),
        ))?,
    };

    if number < SORT_ORDER_MIN as f64 || number > SORT_ORDER_MAX as f64 {
        return Err(SettingsError::validation(
            field,
            format!("{number} is outside {SORT_ORDER_MIN}..={SORT_ORDER_MAX}"),
        ));
    }

    Ok(Some(number as i64))
}

/// Coerce a visibility flag; accepts booleans and common string forms
fn coerce_visible(field: &'static str, value: &Json) -> Result<Option<bool>, SettingsError> {
    match value {
        Json::Null => Ok(None),
        Json::Bool(b) => Ok(Some(*b)),
        Json::String(s) if s.is_empty() => Ok(None),
        Json::String(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            other => Err(SettingsError::validation(field, format!("'{other}' is not a boolean"))),
        },
        other => Err(SettingsError::validation(
            field,
            format!("expected a boolean, got {other}"),
        )),
    }
}

/// Diff one field of a settings entry
///
/// A reset (None) or default-equal value deletes the stored field; a value
/// equal to what is already stored is a no-op. Returns whether the entry
/// changed.
fn apply_field<T: PartialEq + Clone>(slot: &mut Option<T>, incoming: Option<T>, defaults: &[T]) -> bool {
    let is_default = match &incoming {
        None => true,
        Some(value) => defaults.contains(value),
    };

    if is_default {
        if slot.is_some() {
            *slot = None;
            return true;
        }
        return false;
    }

    if *slot == incoming {
        return false;
    }

    *slot = incoming;
    true
}

/// Validate and apply an area settings update
///
/// Returns whether the registry changed; the caller persists and emits
/// events only on true.
pub fn update_area(
    ctx: &RegistryContext,
    registry: &mut AreaSettingsRegistry,
    update: &AreaSettingsUpdate,
) -> Result<bool, SettingsError> {
    // Also the NotFound check
    let current = resolve_area(ctx, &update.area_id)?;

    let mut entry = registry.get(&update.area_id).cloned().unwrap_or_default();
    let mut updated = false;

    if let Some(value) = &update.name {
        let incoming = coerce_string("name", value)?;
        updated |= apply_field(&mut entry.name, incoming, &[current.original_name.clone()]);
    }
    if let Some(value) = &update.icon {
        let incoming = coerce_icon("icon", value)?;
        updated |= apply_field(&mut entry.icon, incoming, &[DEFAULT_AREA_ICON.to_string()]);
    }
    if let Some(value) = &update.sort_order {
        let incoming = coerce_sort_order("sort_order", value)?;
        updated |= apply_field(&mut entry.sort_order, incoming, &[DEFAULT_SORT_ORDER]);
    }
    if let Some(value) = &update.visible {
        let incoming = coerce_visible("visible", value)?;
        updated |= apply_field(&mut entry.visible, incoming, &[true]);
    }

    if updated {
        if entry.is_empty() {
            registry.remove(&update.area_id);
        } else {
            registry.insert(update.area_id.clone(), entry);
        }
        debug!(area_id = %update.area_id, "area settings updated");
    }

    Ok(updated)
}

/// Validate and apply an entity settings update
///
/// For `area_id` and `entity_type`, "default" is the set containing the
/// original (layer-2/3) value and null, so explicitly choosing the default
/// compacts storage instead of duplicating it.
pub fn update_entity(
    ctx: &RegistryContext,
    registry: &mut EntitySettingsRegistry,
    update: &EntitySettingsUpdate,
) -> Result<bool, SettingsError> {
    let current = resolve_entity(ctx, &update.entity_id)?;

    let mut entry = registry.get(&update.entity_id).cloned().unwrap_or_default();
    let mut updated = false;

    if let Some(value) = &update.area_id {
        let incoming = coerce_string("area_id", value)?;
        let defaults: Vec<String> = current.original_area_id.iter().cloned().collect();
        updated |= apply_field(&mut entry.area_id, incoming, &defaults);
    }
    if let Some(value) = &update.entity_type {
        let incoming = coerce_string("entity_type", value)?;
        updated |= apply_field(&mut entry.entity_type, incoming, &[current.original_entity_type.clone()]);
    }
    if let Some(value) = &update.sort_order {
        let incoming = coerce_sort_order("sort_order", value)?;
        updated |= apply_field(&mut entry.sort_order, incoming, &[DEFAULT_SORT_ORDER]);
    }
    if let Some(value) = &update.visible {
        let incoming = coerce_visible("visible", value)?;
        updated |= apply_field(&mut entry.visible, incoming, &[true]);
    }

    if updated {
        if entry.is_empty() {
            registry.remove(&update.entity_id);
        } else {
            registry.insert(update.entity_id.clone(), entry);
        }
        debug!(entity_id = %update.entity_id, "entity settings updated");
    }

    Ok(updated)
}

/// Validate and apply a person settings update
pub fn update_person(
    ctx: &RegistryContext,
    registry: &mut PersonSettingsRegistry,
    update: &PersonSettingsUpdate,
) -> Result<bool, SettingsError> {
    let current = resolve_person(ctx, &update.id)?;

    let mut entry = registry.get(&update.id).cloned().unwrap_or_default();
    let mut updated = false;

    if let Some(value) = &update.name {
        let incoming = coerce_string("name", value)?;
        updated |= apply_field(&mut entry.name, incoming, &[current.original_name.clone()]);
    }
    if let Some(value) = &update.sort_order {
        let incoming = coerce_sort_order("sort_order", value)?;
        updated |= apply_field(&mut entry.sort_order, incoming, &[DEFAULT_SORT_ORDER]);
    }
    if let Some(value) = &update.visible {
        let incoming = coerce_visible("visible", value)?;
        updated |= apply_field(&mut entry.visible, incoming, &[true]);
    }

    if updated {
        if entry.is_empty() {
            registry.remove(&update.id);
        } else {
            registry.insert(update.id.clone(), entry);
        }
        debug!(person_id = %update.id, "person settings updated");
    }

    Ok(updated)
}

/// Drop the stored `area_id` field from every entity that references an
/// area, compacting entries that become empty
pub fn remove_area_from_entities(registry: &mut EntitySettingsRegistry, area_id: &str) -> bool {
    let mut changed = false;
    let mut to_delete = Vec::new();

    for (entity_id, entry) in registry.iter_mut() {
        if entry.area_id.as_deref() == Some(area_id) {
            entry.area_id = None;
            changed = true;
            if entry.is_empty() {
                to_delete.push(entity_id.clone());
            }
        }
    }

    for entity_id in to_delete {
        registry.remove(&entity_id);
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AreaEntry, EntityEntry, EntityState};
    use proptest::prelude::*;
    use serde_json::json;

    fn ctx() -> RegistryContext {
        let mut ctx = RegistryContext::new();
        ctx.set_areas(vec![AreaEntry {
            id: "kitchen".to_string(),
            name: "Kitchen".to_string(),
        }]);
        ctx.states.insert(
            "light.porch".to_string(),
            EntityState {
                entity_id: "light.porch".to_string(),
                state: "on".to_string(),
                attributes: serde_json::Map::new(),
            },
        );
        ctx.entities.insert(
            "light.porch".to_string(),
            EntityEntry {
                entity_id: "light.porch".to_string(),
                area_id: Some("garden".to_string()),
                device_id: None,
                disabled: false,
            },
        );
        ctx
    }

    #[test]
    fn test_unknown_area_rejected() {
        let ctx = ctx();
        let mut registry = AreaSettingsRegistry::new();
        let update = AreaSettingsUpdate {
            area_id: "garage".to_string(),
            name: Some(json!("Garage")),
            ..Default::default()
        };

        assert!(matches!(
            update_area(&ctx, &mut registry, &update),
            Err(SettingsError::AreaNotFound(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_string_sort_order_stored_as_integer() {
        let ctx = ctx();
        let mut registry = AreaSettingsRegistry::new();
        let update = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            sort_order: Some(json!("5")),
            ..Default::default()
        };

        assert!(update_area(&ctx, &mut registry, &update).unwrap());
        assert_eq!(registry["kitchen"].sort_order, Some(5));
    }

    #[test]
    fn test_empty_string_resets_and_default_is_noop() {
        let ctx = ctx();
        let mut registry = AreaSettingsRegistry::new();

        // Store a value
        let update = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            sort_order: Some(json!("5")),
            ..Default::default()
        };
        assert!(update_area(&ctx, &mut registry, &update).unwrap());

        // Empty string removes the field, and with it the entry
        let reset = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            sort_order: Some(json!("")),
            ..Default::default()
        };
        assert!(update_area(&ctx, &mut registry, &reset).unwrap());
        assert!(!registry.contains_key("kitchen"));

        // Updating to the default value with nothing stored is a no-op
        let noop = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            sort_order: Some(json!("0")),
            ..Default::default()
        };
        assert!(!update_area(&ctx, &mut registry, &noop).unwrap());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_same_value_twice_is_idempotent() {
        let ctx = ctx();
        let mut registry = AreaSettingsRegistry::new();
        let update = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            name: Some(json!("Chef HQ")),
            ..Default::default()
        };

        assert!(update_area(&ctx, &mut registry, &update).unwrap());
        assert!(!update_area(&ctx, &mut registry, &update).unwrap());
    }

    #[test]
    fn test_name_equal_to_original_is_removed() {
        let ctx = ctx();
        let mut registry = AreaSettingsRegistry::new();

        let rename = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            name: Some(json!("Chef HQ")),
            ..Default::default()
        };
        assert!(update_area(&ctx, &mut registry, &rename).unwrap());

        // Setting the registry name back removes the override
        let back = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            name: Some(json!("Kitchen")),
            ..Default::default()
        };
        assert!(update_area(&ctx, &mut registry, &back).unwrap());
        assert!(!registry.contains_key("kitchen"));
    }

    #[test]
    fn test_compaction_on_last_field_removed() {
        let ctx = ctx();
        let mut registry = AreaSettingsRegistry::new();

        let update = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            name: Some(json!("Chef HQ")),
            visible: Some(json!(false)),
            ..Default::default()
        };
        assert!(update_area(&ctx, &mut registry, &update).unwrap());

        let reset = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            name: Some(json!("")),
            visible: Some(json!(true)),
            ..Default::default()
        };
        assert!(update_area(&ctx, &mut registry, &reset).unwrap());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_icon_rejected() {
        let ctx = ctx();
        let mut registry = AreaSettingsRegistry::new();
        let update = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            icon: Some(json!("noprefix")),
            ..Default::default()
        };

        assert!(matches!(
            update_area(&ctx, &mut registry, &update),
            Err(SettingsError::Validation { field: "icon", .. })
        ));
    }

    #[test]
    fn test_out_of_range_sort_order_rejected() {
        let ctx = ctx();
        let mut registry = AreaSettingsRegistry::new();
        let update = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            sort_order: Some(json!(SORT_ORDER_MAX + 1)),
            ..Default::default()
        };

        assert!(matches!(
            update_area(&ctx, &mut registry, &update),
            Err(SettingsError::Validation { field: "sort_order", .. })
        ));
    }

    #[test]
    fn test_entity_area_default_set_includes_original_and_null() {
        let ctx = ctx();
        let mut registry = EntitySettingsRegistry::new();

        // The registry area is the default: storing it is a no-op
        let same = EntitySettingsUpdate {
            entity_id: "light.porch".to_string(),
            area_id: Some(json!("garden")),
            ..Default::default()
        };
        assert!(!update_entity(&ctx, &mut registry, &same).unwrap());

        // A different area is stored
        let other = EntitySettingsUpdate {
            entity_id: "light.porch".to_string(),
            area_id: Some(json!("kitchen")),
            ..Default::default()
        };
        assert!(update_entity(&ctx, &mut registry, &other).unwrap());
        assert_eq!(registry["light.porch"].area_id.as_deref(), Some("kitchen"));

        // Resetting with the original value compacts the entry away
        let back = EntitySettingsUpdate {
            entity_id: "light.porch".to_string(),
            area_id: Some(json!("garden")),
            ..Default::default()
        };
        assert!(update_entity(&ctx, &mut registry, &back).unwrap());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_entity_type_reset_to_original() {
        let ctx = ctx();
        let mut registry = EntitySettingsRegistry::new();

        let set = EntitySettingsUpdate {
            entity_id: "light.porch".to_string(),
            entity_type: Some(json!("outdoor_light")),
            ..Default::default()
        };
        assert!(update_entity(&ctx, &mut registry, &set).unwrap());

        // "light" is the original type for this entity
        let reset = EntitySettingsUpdate {
            entity_id: "light.porch".to_string(),
            entity_type: Some(json!("light")),
            ..Default::default()
        };
        assert!(update_entity(&ctx, &mut registry, &reset).unwrap());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_entity_rejected() {
        let ctx = ctx();
        let mut registry = EntitySettingsRegistry::new();
        let update = EntitySettingsUpdate {
            entity_id: "light.ghost".to_string(),
            visible: Some(json!(false)),
            ..Default::default()
        };

        assert!(matches!(
            update_entity(&ctx, &mut registry, &update),
            Err(SettingsError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_visible_string_forms() {
        let ctx = ctx();
        let mut registry = AreaSettingsRegistry::new();

        let update = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            visible: Some(json!("off")),
            ..Default::default()
        };
        assert!(update_area(&ctx, &mut registry, &update).unwrap());
        assert_eq!(registry["kitchen"].visible, Some(false));

        let bad = AreaSettingsUpdate {
            area_id: "kitchen".to_string(),
            visible: Some(json!("maybe")),
            ..Default::default()
        };
        assert!(matches!(
            update_area(&ctx, &mut registry, &bad),
            Err(SettingsError::Validation { field: "visible", .. })
        ));
    }

    #[test]
    fn test_remove_area_from_entities() {
        let mut registry = EntitySettingsRegistry::new();
        registry.insert(
            "light.a".to_string(),
            crate::model::EntitySettings {
                area_id: Some("garden".to_string()),
                ..Default::default()
            },
        );
        registry.insert(
            "light.b".to_string(),
            crate::model::EntitySettings {
                area_id: Some("garden".to_string()),
                sort_order: Some(2),
                ..Default::default()
            },
        );
        registry.insert(
            "light.c".to_string(),
            crate::model::EntitySettings {
                area_id: Some("kitchen".to_string()),
                ..Default::default()
            },
        );

        assert!(remove_area_from_entities(&mut registry, "garden"));

        // light.a became empty and was dropped; light.b kept its other field
        assert!(!registry.contains_key("light.a"));
        assert_eq!(registry["light.b"].area_id, None);
        assert_eq!(registry["light.b"].sort_order, Some(2));
        assert_eq!(registry["light.c"].area_id.as_deref(), Some("kitchen"));

        assert!(!remove_area_from_entities(&mut registry, "garden"));
    }

    proptest! {
        // Storage never holds a field equal to its default, and applying
        // the same in-range sort order twice never reports a second change
        #[test]
        fn prop_sort_order_reset_and_idempotence(value in SORT_ORDER_MIN..=SORT_ORDER_MAX) {
            let ctx = ctx();
            let mut registry = AreaSettingsRegistry::new();
            let update = AreaSettingsUpdate {
                area_id: "kitchen".to_string(),
                sort_order: Some(json!(value)),
                ..Default::default()
            };

            let first = update_area(&ctx, &mut registry, &update).unwrap();
            if value == DEFAULT_SORT_ORDER {
                prop_assert!(!first);
                prop_assert!(registry.is_empty());
            } else {
                prop_assert!(first);
                prop_assert_eq!(registry["kitchen"].sort_order, Some(value));
            }

            let second = update_area(&ctx, &mut registry, &update).unwrap();
            prop_assert!(!second);
        }
    }
}
