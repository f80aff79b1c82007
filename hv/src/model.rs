//! Settings overlays and platform registry data
//!
//! Settings entries are partial: a present field is an explicit user
//! override, an absent field falls through to the platform registry or a
//! computed default. Registry entry types mirror the read-only data the
//! host platform supplies; this crate never writes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Icon used for areas with no explicit icon setting
pub const DEFAULT_AREA_ICON: &str = "mdi:texture-box";

/// Sort order used when no explicit sort order is stored
pub const DEFAULT_SORT_ORDER: i64 = 0;

/// Inclusive lower bound for stored sort orders
pub const SORT_ORDER_MIN: i64 = 0;

/// Inclusive upper bound for stored sort orders
pub const SORT_ORDER_MAX: i64 = 9999;

/// User overrides for one area
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl AreaSettings {
    /// True when no field is set; empty entries must not be stored
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.icon.is_none() && self.sort_order.is_none() && self.visible.is_none()
    }
}

/// User overrides for one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl EntitySettings {
    /// True when no field is set; empty entries must not be stored
    pub fn is_empty(&self) -> bool {
        self.area_id.is_none() && self.entity_type.is_none() && self.sort_order.is_none() && self.visible.is_none()
    }
}

/// User overrides for one person
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl PersonSettings {
    /// True when no field is set; empty entries must not be stored
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.sort_order.is_none() && self.visible.is_none()
    }
}

/// Stored area settings, keyed by area id
pub type AreaSettingsRegistry = BTreeMap<String, AreaSettings>;

/// Stored entity settings, keyed by entity id
pub type EntitySettingsRegistry = BTreeMap<String, EntitySettings>;

/// Stored person settings, keyed by person id
pub type PersonSettingsRegistry = BTreeMap<String, PersonSettings>;

/// Platform area registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaEntry {
    pub id: String,
    pub name: String,
}

/// Platform device registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Platform entity registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEntry {
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// Live state of an entity as reported by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl EntityState {
    /// Display name from the state attributes, if any
    pub fn friendly_name(&self) -> Option<&str> {
        self.attributes.get("friendly_name").and_then(|v| v.as_str())
    }

    /// Device class from the state attributes, if any
    pub fn device_class(&self) -> Option<&str> {
        self.attributes.get("device_class").and_then(|v| v.as_str())
    }
}

/// Platform person registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonEntry {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub device_trackers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// Snapshot of everything resolution reads: platform registries plus the
/// three settings overlays
///
/// A context is replaced wholesale on reload, never mutated in place, so a
/// reader holding one sees a consistent snapshot. Areas are kept sorted by
/// name; area inference depends on that order.
#[derive(Debug, Clone, Default)]
pub struct RegistryContext {
    areas: Vec<AreaEntry>,
    pub devices: BTreeMap<String, DeviceEntry>,
    pub entities: BTreeMap<String, EntityEntry>,
    pub states: BTreeMap<String, EntityState>,
    pub persons: Vec<PersonEntry>,
    pub area_settings: AreaSettingsRegistry,
    pub entity_settings: EntitySettingsRegistry,
    pub person_settings: PersonSettingsRegistry,
}

impl RegistryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the area registry, re-sorting by name
    pub fn set_areas(&mut self, mut areas: Vec<AreaEntry>) {
        areas.sort_by(|a, b| a.name.cmp(&b.name));
        self.areas = areas;
    }

    /// Areas sorted by name
    pub fn areas(&self) -> &[AreaEntry] {
        &self.areas
    }

    pub fn area(&self, area_id: &str) -> Option<&AreaEntry> {
        self.areas.iter().find(|a| a.id == area_id)
    }

    pub fn device(&self, device_id: &str) -> Option<&DeviceEntry> {
        self.devices.get(device_id)
    }

    pub fn entity(&self, entity_id: &str) -> Option<&EntityEntry> {
        self.entities.get(entity_id)
    }

    pub fn state(&self, entity_id: &str) -> Option<&EntityState> {
        self.states.get(entity_id)
    }

    pub fn person(&self, person_id: &str) -> Option<&PersonEntry> {
        self.persons.iter().find(|p| p.id == person_id)
    }
}
