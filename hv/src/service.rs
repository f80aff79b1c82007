//! Settings service
//!
//! Owns the registry context, the persistence store, and the event bus.
//! All mutations go through here: validate against the current context,
//! apply to a cloned settings registry, persist, then swap in a new
//! context as one atomic replacement. Readers holding an old context keep
//! a consistent snapshot.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::error::SettingsError;
use crate::events::{Event, EventBus, SettingsAction};
use crate::model::{AreaEntry, RegistryContext};
use crate::mutation::{
    self, AreaSettingsUpdate, EntitySettingsUpdate, PersonSettingsUpdate,
};
use crate::resolver::{
    self, AreaView, EntityView, PersonView, entity_type_catalog, resolve_area, resolve_entity, resolve_person,
};
use crate::store::{SettingsKind, SettingsStore};

/// Coordinates settings reads and writes over one shared context
pub struct SettingsService {
    store: SettingsStore,
    bus: Arc<EventBus>,
    ctx: RwLock<Arc<RegistryContext>>,
}

impl SettingsService {
    /// Create a service with an empty context
    pub fn new(store: SettingsStore, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus,
            ctx: RwLock::new(Arc::new(RegistryContext::new())),
        }
    }

    /// Current context snapshot
    pub async fn context(&self) -> Arc<RegistryContext> {
        self.ctx.read().await.clone()
    }

    /// Replace the whole context, for registry pushes from the platform
    pub async fn replace_context(&self, ctx: RegistryContext) {
        *self.ctx.write().await = Arc::new(ctx);
    }

    /// Load all three settings registries from storage into the context
    pub async fn reload_settings(&self) -> Result<(), SettingsError> {
        let area_settings = self.store.load(SettingsKind::Areas)?;
        let entity_settings = self.store.load(SettingsKind::Entities)?;
        let person_settings = self.store.load(SettingsKind::Persons)?;

        let mut guard = self.ctx.write().await;
        let mut next = (**guard).clone();
        next.area_settings = area_settings;
        next.entity_settings = entity_settings;
        next.person_settings = person_settings;
        *guard = Arc::new(next);
        drop(guard);

        info!("settings registries reloaded from storage");
        self.bus.emit(Event::SettingsChanged);
        Ok(())
    }

    /// Replace the platform area registry
    pub async fn set_area_registry(&self, areas: Vec<AreaEntry>) {
        let mut guard = self.ctx.write().await;
        let mut next = (**guard).clone();
        next.set_areas(areas);
        *guard = Arc::new(next);
        drop(guard);

        self.bus.emit(Event::AreaRegistryUpdated);
    }

    /// Effective view of one area
    pub async fn get_area(&self, area_id: &str) -> Result<AreaView, SettingsError> {
        resolve_area(&*self.context().await, area_id)
    }

    /// Effective view of one entity
    pub async fn get_entity(&self, entity_id: &str) -> Result<EntityView, SettingsError> {
        resolve_entity(&*self.context().await, entity_id)
    }

    /// Effective view of one person
    pub async fn get_person(&self, person_id: &str) -> Result<PersonView, SettingsError> {
        resolve_person(&*self.context().await, person_id)
    }

    /// All areas in name order
    pub async fn areas(&self, include_hidden: bool) -> Vec<AreaView> {
        resolver::all_areas(&*self.context().await, include_hidden)
    }

    /// All entities with a live state
    pub async fn entities(&self, include_hidden: bool, include_disabled: bool) -> Vec<EntityView> {
        resolver::all_entities(&*self.context().await, include_hidden, include_disabled)
    }

    /// All persons
    pub async fn persons(&self, include_hidden: bool) -> Vec<PersonView> {
        resolver::all_persons(&*self.context().await, include_hidden)
    }

    /// Known entity types: the built-in catalog plus stored overrides
    pub async fn entity_types(&self) -> Vec<String> {
        let ctx = self.context().await;
        let mut types: Vec<String> = entity_type_catalog().iter().map(|t| t.to_string()).collect();
        for settings in ctx.entity_settings.values() {
            if let Some(entity_type) = &settings.entity_type {
                if !types.contains(entity_type) {
                    types.push(entity_type.clone());
                }
            }
        }
        types.sort();
        types
    }

    /// Apply an area settings update; persists and emits only on change
    pub async fn set_area_settings(&self, update: AreaSettingsUpdate) -> Result<bool, SettingsError> {
        let mut guard = self.ctx.write().await;
        let mut registry = guard.area_settings.clone();
        let updated = mutation::update_area(&guard, &mut registry, &update)?;

        if updated {
            self.store.save(SettingsKind::Areas, &registry)?;
            let mut next = (**guard).clone();
            next.area_settings = registry;
            *guard = Arc::new(next);
            drop(guard);

            self.bus.emit(Event::AreaSettingsChanged {
                action: SettingsAction::Update,
                area_id: update.area_id.clone(),
            });
            self.bus.emit(Event::SettingsChanged);
        }

        Ok(updated)
    }

    /// Apply an entity settings update; persists and emits only on change
    pub async fn set_entity_settings(&self, update: EntitySettingsUpdate) -> Result<bool, SettingsError> {
        let mut guard = self.ctx.write().await;
        let mut registry = guard.entity_settings.clone();
        let updated = mutation::update_entity(&guard, &mut registry, &update)?;

        if updated {
            self.store.save(SettingsKind::Entities, &registry)?;
            let mut next = (**guard).clone();
            next.entity_settings = registry;
            *guard = Arc::new(next);
            drop(guard);

            self.bus.emit(Event::EntitySettingsChanged {
                action: SettingsAction::Update,
                entity_id: update.entity_id.clone(),
            });
            self.bus.emit(Event::SettingsChanged);
        }

        Ok(updated)
    }

    /// Apply a person settings update; persists and emits only on change
    pub async fn set_person_settings(&self, update: PersonSettingsUpdate) -> Result<bool, SettingsError> {
        let mut guard = self.ctx.write().await;
        let mut registry = guard.person_settings.clone();
        let updated = mutation::update_person(&guard, &mut registry, &update)?;

        if updated {
            self.store.save(SettingsKind::Persons, &registry)?;
            let mut next = (**guard).clone();
            next.person_settings = registry;
            *guard = Arc::new(next);
            drop(guard);

            self.bus.emit(Event::PersonSettingsChanged {
                action: SettingsAction::Update,
                person_id: update.id.clone(),
            });
            self.bus.emit(Event::SettingsChanged);
        }

        Ok(updated)
    }

    /// Drop all stored settings for one area
    pub async fn remove_area_settings(&self, area_id: &str) -> Result<bool, SettingsError> {
        let mut guard = self.ctx.write().await;
        let mut registry = guard.area_settings.clone();
        let removed = registry.remove(area_id).is_some();

        if removed {
            self.store.save(SettingsKind::Areas, &registry)?;
            let mut next = (**guard).clone();
            next.area_settings = registry;
            *guard = Arc::new(next);
            drop(guard);

            self.bus.emit(Event::AreaSettingsChanged {
                action: SettingsAction::Remove,
                area_id: area_id.to_string(),
            });
            self.bus.emit(Event::SettingsChanged);
        }

        Ok(removed)
    }

    /// Drop all stored settings for one entity
    pub async fn remove_entity_settings(&self, entity_id: &str) -> Result<bool, SettingsError> {
        let mut guard = self.ctx.write().await;
        let mut registry = guard.entity_settings.clone();
        let removed = registry.remove(entity_id).is_some();

        if removed {
            self.store.save(SettingsKind::Entities, &registry)?;
            let mut next = (**guard).clone();
            next.entity_settings = registry;
            *guard = Arc::new(next);
            drop(guard);

            self.bus.emit(Event::EntitySettingsChanged {
                action: SettingsAction::Remove,
                entity_id: entity_id.to_string(),
            });
            self.bus.emit(Event::SettingsChanged);
        }

        Ok(removed)
    }

    /// Drop all stored settings for one person
    pub async fn remove_person_settings(&self, person_id: &str) -> Result<bool, SettingsError> {
        let mut guard = self.ctx.write().await;
        let mut registry = guard.person_settings.clone();
        let removed = registry.remove(person_id).is_some();

        if removed {
            self.store.save(SettingsKind::Persons, &registry)?;
            let mut next = (**guard).clone();
            next.person_settings = registry;
            *guard = Arc::new(next);
            drop(guard);

            self.bus.emit(Event::PersonSettingsChanged {
                action: SettingsAction::Remove,
                person_id: person_id.to_string(),
            });
            self.bus.emit(Event::SettingsChanged);
        }

        Ok(removed)
    }

    /// Clear a deleted area out of every entity's stored settings
    pub async fn remove_area_from_entities(&self, area_id: &str) -> Result<bool, SettingsError> {
        let mut guard = self.ctx.write().await;
        let mut registry = guard.entity_settings.clone();
        let changed = mutation::remove_area_from_entities(&mut registry, area_id);

        if changed {
            self.store.save(SettingsKind::Entities, &registry)?;
            let mut next = (**guard).clone();
            next.entity_settings = registry;
            *guard = Arc::new(next);
            drop(guard);

            self.bus.emit(Event::SettingsChanged);
        }

        Ok(changed)
    }
}
