//! Stable identifiers for native entities.
//!
//! Ids survive save and reload, independently of any session. Deterministic
//! ids hash an entity's natural key, so replicas that start from the same
//! baseline agree on them without talking to each other. Random ids are v4
//! UUIDs.
//!
//! Either way a candidate that is already bound to a different live entity
//! is incremented, as a 128-bit integer, until it is free.

use crate::{error::Result, EntityId, GuidList, World};
use std::collections::HashMap;
use uuid::Uuid;

/// Namespace for deterministic ids.
const ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3c, 0x1f, 0x6e, 0x52, 0x8a, 0x07, 0x4d, 0x3b, 0x9e, 0x41, 0x5b, 0xd2, 0x70, 0x0c, 0xa4, 0x19,
]);

#[derive(Debug, Clone, Default)]
pub struct GuidManager {
    by_entity: HashMap<EntityId, Uuid>,
    by_id: HashMap<Uuid, EntityId>,
}

impl GuidManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_id(&self, entity: EntityId) -> Option<Uuid> {
        self.by_entity.get(&entity).copied()
    }

    pub fn get_entity(&self, id: &Uuid) -> Option<EntityId> {
        self.by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }

    /// Return the entity's id, assigning one if it has none.
    pub fn get_or_create_id(
        &mut self,
        entity: EntityId,
        deterministic: bool,
        world: &dyn World,
    ) -> Uuid {
        if let Some(id) = self.get_id(entity) {
            return id;
        }
        let candidate = if deterministic {
            self.derive(entity, world)
        } else {
            Uuid::new_v4()
        };
        self.bind(entity, candidate, world)
    }

    /// Bind an externally supplied id, incrementing past collisions. Returns the
    /// id actually bound.
    pub fn set_id(&mut self, entity: EntityId, id: Uuid, world: &dyn World) -> Uuid {
        self.bind(entity, id, world)
    }

    /// Forget the entity's id.
    pub fn remove(&mut self, entity: EntityId) -> Option<Uuid> {
        let id = self.by_entity.remove(&entity)?;
        if self.by_id.get(&id) == Some(&entity) {
            self.by_id.remove(&id);
        }
        Some(id)
    }

    pub fn clear(&mut self) {
        self.by_entity.clear();
        self.by_id.clear();
    }

    /// Snapshot the ids of live entities in `scope`. Entities without a
    /// natural key are included.
    pub fn save(&self, scope: &str, world: &dyn World) -> GuidList {
        let mut list = GuidList::new(scope);
        for (entity, id) in &self.by_entity {
            if !world.is_alive(*entity) {
                continue;
            }
            let in_scope = world
                .natural_key(*entity)
                .map_or(true, |key| key.scope == scope);
            if in_scope {
                list.push(*id.as_bytes(), *entity);
            }
        }
        list
    }

    /// Bind every listed id to its entity. Entries for entities that are no
    /// longer alive are skipped. An id already taken by another live entity,
    /// including an earlier entry of the same list, is incremented until free.
    /// Returns the entities whose id changed.
    pub fn load(&mut self, list: &GuidList, world: &dyn World) -> Result<Vec<EntityId>> {
        list.validate()?;
        let mut changed = Vec::new();
        for entry in &list.entries {
            if !world.is_alive(entry.entity) {
                continue;
            }
            let previous = self.get_id(entry.entity);
            let bound = self.bind(entry.entity, Uuid::from_bytes(entry.id), world);
            if previous != Some(bound) {
                changed.push(entry.entity);
            }
        }
        tracing::debug!(
            scope = %list.scope,
            entries = list.len(),
            changed = changed.len(),
            "loaded ids"
        );
        Ok(changed)
    }

    /// Hash the natural key: scope, name, parent id and local transform.
    fn derive(&mut self, entity: EntityId, world: &dyn World) -> Uuid {
        let Some(key) = world.natural_key(entity) else {
            tracing::debug!(entity, "no natural key, using a random id");
            return Uuid::new_v4();
        };

        let parent = key
            .parent
            .map(|p| self.get_or_create_id(p, true, world))
            .unwrap_or(Uuid::nil());

        let mut bytes = Vec::with_capacity(
            key.scope.len() + key.name.len() + 18 + key.transform.len() * 4,
        );
        bytes.extend_from_slice(key.scope.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(key.name.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(parent.as_bytes());
        for component in &key.transform {
            bytes.extend_from_slice(&component.to_le_bytes());
        }
        Uuid::new_v5(&ID_NAMESPACE, &bytes)
    }

    /// Bind `entity` to `candidate` or the first free id after it.
    fn bind(&mut self, entity: EntityId, mut candidate: Uuid, world: &dyn World) -> Uuid {
        while let Some(&owner) = self.by_id.get(&candidate) {
            if owner == entity || !world.is_alive(owner) {
                break;
            }
            let next = Uuid::from_u128(candidate.as_u128().wrapping_add(1));
            tracing::debug!(entity, owner, %candidate, %next, "id collision, incrementing");
            candidate = next;
        }

        // A dead entity's binding is taken over.
        if let Some(stale) = self.by_id.insert(candidate, entity) {
            if stale != entity {
                self.by_entity.remove(&stale);
            }
        }
        if let Some(old) = self.by_entity.insert(entity, candidate) {
            if old != candidate && self.by_id.get(&old) == Some(&entity) {
                self.by_id.remove(&old);
            }
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntitySchema, FieldDef, FieldType, FieldValue, Scene, SchemaRegistry};

    fn scene() -> Scene {
        let registry = SchemaRegistry::new(1).with(EntitySchema::new(
            "node",
            vec![FieldDef::synced(
                "position",
                FieldType::Vector3,
                FieldValue::Vector3([0.0; 3]),
            )],
        ));
        Scene::new(registry, "level-1")
    }

    #[test]
    fn existing_id_is_returned() {
        let mut scene = scene();
        let entity = scene.spawn("node").unwrap();
        let mut guids = GuidManager::new();
        let first = guids.get_or_create_id(entity, false, &scene);
        assert_eq!(guids.get_or_create_id(entity, false, &scene), first);
        assert_eq!(guids.get_entity(&first), Some(entity));
    }

    #[test]
    fn deterministic_ids_agree_across_replicas() {
        let build = || {
            let mut scene = scene();
            let root = scene.spawn_named("node", "root").unwrap();
            let child = scene.spawn_named("node", "lamp").unwrap();
            scene.set_parent(child, Some(root), None);
            scene.set(child, "position", [1.0f32, 0.0, 2.0]).unwrap();
            let mut guids = GuidManager::new();
            let id = guids.get_or_create_id(child, true, &scene);
            (id, guids.get_id(root))
        };

        let (a, parent_a) = build();
        let (b, parent_b) = build();
        assert_eq!(a, b);
        assert!(parent_a.is_some());
        assert_eq!(parent_a, parent_b);
    }

    #[test]
    fn natural_key_changes_id() {
        let mut scene = scene();
        let a = scene.spawn_named("node", "lamp").unwrap();
        let b = scene.spawn_named("node", "lamp").unwrap();
        scene.set(b, "position", [0.0f32, 1.0, 0.0]).unwrap();

        let mut guids = GuidManager::new();
        assert_ne!(
            guids.get_or_create_id(a, true, &scene),
            guids.get_or_create_id(b, true, &scene)
        );
    }

    #[test]
    fn colliding_candidates_are_incremented() {
        let mut scene = scene();
        let a = scene.spawn_named("node", "twin").unwrap();
        let b = scene.spawn_named("node", "twin").unwrap();

        let mut guids = GuidManager::new();
        let id_a = guids.get_or_create_id(a, true, &scene);
        let id_b = guids.get_or_create_id(b, true, &scene);

        assert_ne!(id_a, id_b);
        assert_eq!(id_b.as_u128(), id_a.as_u128() + 1);
        assert_eq!(guids.get_entity(&id_a), Some(a));
        assert_eq!(guids.get_entity(&id_b), Some(b));
    }

    #[test]
    fn increment_carries_across_bytes() {
        let mut scene = scene();
        let a = scene.spawn("node").unwrap();
        let b = scene.spawn("node").unwrap();
        let mut guids = GuidManager::new();

        let mut bytes = [0u8; 16];
        bytes[15] = 0xff;
        bytes[14] = 0xff;
        let id = Uuid::from_bytes(bytes);
        guids.set_id(a, id, &scene);
        let bound = guids.set_id(b, id, &scene);

        let mut expected = [0u8; 16];
        expected[13] = 1;
        assert_eq!(bound, Uuid::from_bytes(expected));
    }

    #[test]
    fn dead_owner_loses_its_id() {
        let mut scene = scene();
        let a = scene.spawn("node").unwrap();
        let b = scene.spawn("node").unwrap();
        let mut guids = GuidManager::new();
        let id = guids.get_or_create_id(a, false, &scene);

        scene.despawn(a);
        assert_eq!(guids.set_id(b, id, &scene), id);
        assert_eq!(guids.get_entity(&id), Some(b));
        assert_eq!(guids.get_id(a), None);
    }

    #[test]
    fn remove_forgets_both_directions() {
        let mut scene = scene();
        let a = scene.spawn("node").unwrap();
        let mut guids = GuidManager::new();
        let id = guids.get_or_create_id(a, false, &scene);

        assert_eq!(guids.remove(a), Some(id));
        assert!(guids.get_entity(&id).is_none());
        assert!(guids.is_empty());
    }

    #[test]
    fn save_then_load_restores_ids() {
        let mut scene = scene();
        let a = scene.spawn("node").unwrap();
        let b = scene.spawn("node").unwrap();
        let mut guids = GuidManager::new();
        let id_a = guids.get_or_create_id(a, false, &scene);
        let id_b = guids.get_or_create_id(b, false, &scene);

        let list = guids.save("level-1", &scene);
        assert_eq!(list.len(), 2);
        assert!(guids.save("other-level", &scene).is_empty());

        let mut restored = GuidManager::new();
        let changed = restored.load(&list, &scene).unwrap();
        assert_eq!(changed, vec![a, b]);
        assert_eq!(restored.get_id(a), Some(id_a));
        assert_eq!(restored.get_id(b), Some(id_b));

        assert!(restored.load(&list, &scene).unwrap().is_empty());
    }

    #[test]
    fn shared_id_on_load_is_split() {
        let mut scene = scene();
        let a = scene.spawn("node").unwrap();
        let b = scene.spawn("node").unwrap();
        let mut list = GuidList::new("level-1");
        list.push([7; 16], a);
        list.push([7; 16], b);

        let mut guids = GuidManager::new();
        assert_eq!(guids.load(&list, &scene).unwrap(), vec![a, b]);

        let id_a = guids.get_id(a).unwrap();
        let id_b = guids.get_id(b).unwrap();
        assert_eq!(id_a, Uuid::from_bytes([7; 16]));
        assert_eq!(id_b.as_u128(), id_a.as_u128() + 1);
        assert_eq!(guids.get_entity(&id_a), Some(a));
        assert_eq!(guids.get_entity(&id_b), Some(b));
    }

    #[test]
    fn repeated_entity_on_load_is_rejected() {
        let mut scene = scene();
        let a = scene.spawn("node").unwrap();
        let mut list = GuidList::new("level-1");
        list.push([1; 16], a);
        list.push([2; 16], a);

        let mut guids = GuidManager::new();
        assert!(guids.load(&list, &scene).is_err());
        assert!(guids.is_empty());
    }
}
