//! Entity extra-state store
//!
//! Holds every entity the engine has been told about, keyed by id. Entries
//! never expire; they go away only when the owning registry removes them.

use std::collections::HashMap;

use log::debug;

use crate::config::StoreConfig;
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{Result, StatsError};

/// Entities and their extra-state, keyed by entity id
#[derive(Debug, Default)]
pub struct EntityStore {
    /// Map of entity ID to entity
    entities: HashMap<EntityId, Entity>,
    /// Maximum number of entities allowed
    max_entities: Option<usize>,
}

impl EntityStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given limits
    pub fn with_config(config: &StoreConfig) -> Self {
        Self {
            entities: HashMap::new(),
            max_entities: config.max_entities,
        }
    }

    /// Register an entity
    ///
    /// Registering an id that already exists keeps its extra-state and only
    /// refreshes kind and address.
    pub fn register(
        &mut self,
        id: impl Into<EntityId>,
        kind: EntityKind,
        mac: impl Into<String>,
    ) -> Result<&mut Entity> {
        let id = id.into();
        let mac = mac.into();

        if !self.entities.contains_key(&id) {
            if let Some(max) = self.max_entities {
                if self.entities.len() >= max {
                    return Err(StatsError::StoreFull { max });
                }
            }
            debug!("registering {} entity {}", kind, id);
            let entity = Entity::new(id.clone(), kind, mac);
            return Ok(self.entities.entry(id).or_insert(entity));
        }

        let fresh = Entity::new(id.clone(), kind, mac);
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or_else(|| StatsError::UnknownEntity(id.clone()))?;
        entity.kind = fresh.kind;
        entity.mac = fresh.mac;
        Ok(entity)
    }

    /// Get an entity, registering it on first sight
    ///
    /// Unlike [`register`](Self::register), an existing entry is returned
    /// untouched.
    pub fn get_or_register(
        &mut self,
        id: &str,
        kind: EntityKind,
        mac: impl Into<String>,
    ) -> Result<&mut Entity> {
        if self.entities.contains_key(id) {
            return self.get_mut(id);
        }
        self.register(id, kind, mac)
    }

    /// Remove an entity together with its extra-state
    pub fn remove(&mut self, id: &str) -> Result<Entity> {
        self.entities
            .remove(id)
            .ok_or_else(|| StatsError::UnknownEntity(id.to_string()))
    }

    /// Get a reference to an entity
    pub fn get(&self, id: &str) -> Result<&Entity> {
        self.entities
            .get(id)
            .ok_or_else(|| StatsError::UnknownEntity(id.to_string()))
    }

    /// Get a mutable reference to an entity
    pub fn get_mut(&mut self, id: &str) -> Result<&mut Entity> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| StatsError::UnknownEntity(id.to_string()))
    }

    /// Check if an entity exists
    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Iterate over entities
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let mut store = EntityStore::new();
        store
            .register("0x00158d0001a2b3c4", EntityKind::RadioLink, "00:15:8D:00:01:A2:B3:C4")
            .unwrap();

        assert!(store.contains("0x00158d0001a2b3c4"));
        let entity = store.get("0x00158d0001a2b3c4").unwrap();
        assert_eq!(entity.mac, "00158d0001a2b3c4");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_register_keeps_extra_state() {
        let mut store = EntityStore::new();
        store
            .register("dev", EntityKind::RadioLink, "aa")
            .unwrap()
            .extra
            .record_received();

        let entity = store.register("dev", EntityKind::RadioLink, "BB").unwrap();
        assert_eq!(entity.extra.msg_received, Some(1));
        assert_eq!(entity.mac, "bb");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_full() {
        let mut store = EntityStore::with_config(&StoreConfig {
            max_entities: Some(1),
        });
        store.register("a", EntityKind::ShortRange, "").unwrap();
        let result = store.register("b", EntityKind::ShortRange, "");
        assert!(matches!(result, Err(StatsError::StoreFull { max: 1 })));

        // Re-registering a known entity is not a new entry
        assert!(store.register("a", EntityKind::ShortRange, "").is_ok());
    }

    #[test]
    fn test_get_or_register() {
        let mut store = EntityStore::new();
        store
            .get_or_register("dev", EntityKind::RadioLink, "aa")
            .unwrap()
            .extra
            .record_received();

        let entity = store.get_or_register("dev", EntityKind::ShortRange, "bb").unwrap();
        assert_eq!(entity.kind, EntityKind::RadioLink);
        assert_eq!(entity.mac, "aa");
        assert_eq!(entity.extra.msg_received, Some(1));
    }

    #[test]
    fn test_remove_and_not_found() {
        let mut store = EntityStore::new();
        store.register("a", EntityKind::Gateway, "").unwrap();
        let removed = store.remove("a").unwrap();
        assert_eq!(removed.id, "a");
        assert!(store.is_empty());
        assert!(matches!(store.get("a"), Err(StatsError::UnknownEntity(_))));
        assert!(matches!(store.remove("a"), Err(StatsError::UnknownEntity(_))));
    }
}
