//! In-memory entity collections.
//!
//! A driver keeps two of these: `available` (everything it can expose) and
//! `configured` (what the hub subscribed to). Attribute updates on a store
//! are published on its change channel; the server forwards changes of the
//! configured store to every hub as `entity_change` events.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::entity::{Attributes, Entity, EntityDescriptor, EntityState, EntityType};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Attribute change published by an entity store.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityChange {
    pub entity_id: String,
    pub entity_type: EntityType,
    /// The attributes that were updated.
    pub attributes: Attributes,
}

/// Named, thread-safe entity collection with change notification.
pub struct Entities {
    name: String,
    storage: RwLock<BTreeMap<String, Entity>>,
    changes: broadcast::Sender<EntityChange>,
}

impl Entities {
    pub fn new(name: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            name: name.into(),
            storage: RwLock::new(BTreeMap::new()),
            changes,
        }
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.storage.read().contains_key(entity_id)
    }

    pub fn get(&self, entity_id: &str) -> Option<Entity> {
        self.storage.read().get(entity_id).cloned()
    }

    /// Add an entity. Returns `false` if an entity with the same id exists.
    pub fn add(&self, entity: Entity) -> bool {
        let mut storage = self.storage.write();
        if storage.contains_key(&entity.id) {
            warn!(store = %self.name, entity_id = %entity.id, "entity already exists");
            return false;
        }
        debug!(store = %self.name, entity_id = %entity.id, "entity added");
        let _ = storage.insert(entity.id.clone(), entity);
        true
    }

    /// Remove an entity. Returns `false` if it was not present.
    pub fn remove(&self, entity_id: &str) -> bool {
        let removed = self.storage.write().remove(entity_id).is_some();
        if removed {
            debug!(store = %self.name, entity_id, "entity removed");
        }
        removed
    }

    /// Merge `attributes` into the entity and publish the change.
    ///
    /// Returns `false` if the entity does not exist.
    pub fn update_attributes(&self, entity_id: &str, attributes: Attributes) -> bool {
        let entity_type = {
            let mut storage = self.storage.write();
            let Some(entity) = storage.get_mut(entity_id) else {
                return false;
            };
            for (key, value) in &attributes {
                let _ = entity.attributes.insert(key.clone(), value.clone());
            }
            entity.entity_type
        };

        // No subscribers is fine: nobody is listening to this store.
        let _ = self.changes.send(EntityChange {
            entity_id: entity_id.to_owned(),
            entity_type,
            attributes,
        });
        true
    }

    /// Descriptors of all entities.
    pub fn get_all(&self) -> Vec<EntityDescriptor> {
        self.storage.read().values().map(Entity::descriptor).collect()
    }

    /// State snapshots of all entities.
    pub fn get_states(&self) -> Vec<EntityState> {
        self.storage.read().values().map(Entity::state).collect()
    }

    pub fn clear(&self) {
        self.storage.write().clear();
    }

    pub fn len(&self) -> usize {
        self.storage.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.read().is_empty()
    }

    /// Subscribe to attribute changes of this store.
    pub fn subscribe(&self) -> broadcast::Receiver<EntityChange> {
        self.changes.subscribe()
    }
}
