//! HomeView - display metadata overlay for home automation objects
//!
//! HomeView layers user-facing display settings (names, icons, sort
//! orders, visibility, area assignment) over the read-only registries a
//! home automation platform exposes, without ever writing to those
//! registries.
//!
//! # Core Concepts
//!
//! - **Layered Resolution**: settings override registry data, registry
//!   data overrides computed defaults
//! - **Sparse Storage**: only explicit overrides persist; defaults are
//!   never written and empty entries are compacted away
//! - **Atomic Snapshots**: the registry context is replaced wholesale, so
//!   readers always see a consistent world
//! - **Change Events**: every effective mutation emits on a broadcast bus
//!
//! # Modules
//!
//! - [`model`] - settings overlays and platform registry data
//! - [`resolver`] - effective view computation and area inference
//! - [`mutation`] - validated settings updates with default compaction
//! - [`store`] - versioned JSON persistence for the settings registries
//! - [`service`] - the coordinating service over context, store, and bus
//! - [`events`] - broadcast bus and event vocabulary
//! - [`template`] - exporting resolved views as template globals

pub mod error;
pub mod events;
pub mod model;
pub mod mutation;
pub mod resolver;
pub mod service;
pub mod store;
pub mod template;

// Re-export commonly used types
pub use error::SettingsError;
pub use events::{DEFAULT_CHANNEL_CAPACITY, Event, EventBus, SettingsAction};
pub use model::{
    AreaEntry, AreaSettings, AreaSettingsRegistry, DEFAULT_AREA_ICON, DEFAULT_SORT_ORDER, DeviceEntry, EntityEntry,
    EntitySettings, EntitySettingsRegistry, EntityState, PersonEntry, PersonSettings, PersonSettingsRegistry,
    RegistryContext, SORT_ORDER_MAX, SORT_ORDER_MIN,
};
pub use mutation::{AreaSettingsUpdate, EntitySettingsUpdate, PersonSettingsUpdate};
pub use resolver::{
    AreaView, EntityView, PersonView, all_areas, all_entities, all_persons, entity_type_catalog, infer_area_id,
    resolve_area, resolve_entity, resolve_person, split_entity_id,
};
pub use service::SettingsService;
pub use store::{STORAGE_VERSION, SettingsKind, SettingsStore, StoreError};
pub use template::{refresh_globals, template_globals};
