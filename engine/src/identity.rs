//! Bidirectional map between native entities and replicated objects.
//!
//! The map owns nothing; it only records which entity an object stands for.
//! Removing one side removes the pair only while the reverse mapping still
//! agrees, so a stale removal cannot clobber a newer association.

use crate::{EntityId, ObjectFlags, ObjectId, Property, Session};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    by_entity: HashMap<EntityId, ObjectId>,
    by_object: HashMap<ObjectId, EntityId>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_entity(&self, entity: EntityId) -> bool {
        self.by_entity.contains_key(&entity)
    }

    pub fn contains_object(&self, object: ObjectId) -> bool {
        self.by_object.contains_key(&object)
    }

    /// Object replicating `entity`.
    pub fn object_of(&self, entity: EntityId) -> Option<ObjectId> {
        self.by_entity.get(&entity).copied()
    }

    /// Entity replicated by `object`.
    pub fn entity_of(&self, object: ObjectId) -> Option<EntityId> {
        self.by_object.get(&object).copied()
    }

    /// Return the object for `entity`, asking the session to create one with
    /// an empty dictionary root if there is none.
    pub fn get_or_create(
        &mut self,
        entity: EntityId,
        type_tag: &str,
        flags: ObjectFlags,
        session: &mut dyn Session,
    ) -> ObjectId {
        if let Some(object) = self.object_of(entity) {
            return object;
        }
        let object = session.create_object(type_tag, Property::dictionary(), flags, None);
        self.add(object, entity);
        object
    }

    /// Associate `object` with `entity` in both directions.
    pub fn add(&mut self, object: ObjectId, entity: EntityId) {
        self.by_entity.insert(entity, object);
        self.by_object.insert(object, entity);
    }

    /// Forget `entity`. The object side is cleared only if it still points
    /// back at `entity`.
    pub fn remove_entity(&mut self, entity: EntityId) -> Option<ObjectId> {
        let object = self.by_entity.remove(&entity)?;
        if self.by_object.get(&object) == Some(&entity) {
            self.by_object.remove(&object);
        }
        Some(object)
    }

    /// Forget `object`. The entity side is cleared only if it still points
    /// back at `object`.
    pub fn remove_object(&mut self, object: ObjectId) -> Option<EntityId> {
        let entity = self.by_object.remove(&object)?;
        if self.by_entity.get(&entity) == Some(&object) {
            self.by_entity.remove(&entity);
        }
        Some(entity)
    }

    pub fn clear(&mut self) {
        self.by_entity.clear();
        self.by_object.clear();
    }

    /// Number of live pairs.
    pub fn len(&self) -> usize {
        self.by_object.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_object.is_empty() && self.by_entity.is_empty()
    }

    /// Iterate over `(entity, object)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, ObjectId)> + '_ {
        self.by_object.iter().map(|(object, entity)| (*entity, *object))
    }
}
