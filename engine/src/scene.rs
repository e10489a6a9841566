//! A schema-driven in-memory host world.
//!
//! [`DynamicEntity`] implements [`EntityAdapter`] from an [`EntitySchema`]
//! rather than from compiled-in fields. Entities instantiated from a template
//! take the template's values as their defaults. [`Scene`] holds entities in a
//! parent/child hierarchy and implements [`World`].

use crate::{
    error::Result, EntityAdapter, EntityId, EntitySchema, Error, FieldValue, NaturalKey,
    SchemaRegistry, World,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Transform fields folded into an entity's natural key, in order.
const TRANSFORM_FIELDS: [&str; 3] = ["position", "rotation", "scale"];

/// An entity whose fields are described by a schema.
#[derive(Debug, Clone)]
pub struct DynamicEntity {
    id: EntityId,
    schema: Arc<EntitySchema>,
    /// Explicitly assigned values; absent fields read as their default
    values: BTreeMap<String, FieldValue>,
    /// Template values captured at instantiation
    template: Option<BTreeMap<String, FieldValue>>,
    name: String,
    scope: String,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

impl DynamicEntity {
    pub fn new(id: EntityId, schema: Arc<EntitySchema>) -> Self {
        Self {
            id,
            schema,
            values: BTreeMap::new(),
            template: None,
            name: String::new(),
            scope: String::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Whether this entity was instantiated from a template.
    pub fn is_instance(&self) -> bool {
        self.template.is_some()
    }

    /// Current values of every schema field, defaults included.
    pub fn field_values(&self) -> BTreeMap<String, FieldValue> {
        self.schema
            .fields
            .iter()
            .filter_map(|f| Some((f.name.clone(), self.get_field(&f.name)?)))
            .collect()
    }

    /// Position, rotation and scale components, where the schema has them.
    pub fn local_transform(&self) -> Vec<f32> {
        TRANSFORM_FIELDS
            .iter()
            .filter_map(|name| match self.get_field(name) {
                Some(FieldValue::Vector3(v)) => Some(v),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl EntityAdapter for DynamicEntity {
    fn type_tag(&self) -> &str {
        &self.schema.type_tag
    }

    fn list_fields(&self) -> Vec<String> {
        self.schema.synced_fields().map(str::to_string).collect()
    }

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        self.values
            .get(name)
            .cloned()
            .or_else(|| self.default_field(name))
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let def = self
            .schema
            .field(name)
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
        def.validate(&value)?;
        let value = def.normalize(value);
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    fn default_field(&self, name: &str) -> Option<FieldValue> {
        let def = self.schema.field(name)?;
        let from_template = self.template.as_ref().and_then(|t| t.get(name));
        Some(from_template.cloned().unwrap_or_else(|| def.default.clone()))
    }
}

/// Entities of one host, organised as a forest.
#[derive(Debug, Clone)]
pub struct Scene {
    registry: SchemaRegistry,
    scope: String,
    entities: BTreeMap<EntityId, DynamicEntity>,
    next_id: EntityId,
    lock_markers: HashSet<EntityId>,
}

impl Scene {
    /// Create an empty scene whose entities live in `scope`.
    pub fn new(registry: SchemaRegistry, scope: impl Into<String>) -> Self {
        Self {
            registry,
            scope: scope.into(),
            entities: BTreeMap::new(),
            next_id: 1,
            lock_markers: HashSet::new(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn get(&self, id: EntityId) -> Option<&DynamicEntity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut DynamicEntity> {
        self.entities.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Spawn a named entity.
    pub fn spawn_named(&mut self, type_tag: &str, name: impl Into<String>) -> Option<EntityId> {
        let schema = self.registry.get(type_tag)?.clone();
        let id = self.next_id;
        self.next_id += 1;

        let mut entity = DynamicEntity::new(id, schema);
        entity.name = name.into();
        entity.scope = self.scope.clone();
        self.entities.insert(id, entity);
        Some(id)
    }

    /// Spawn an instance of `template`. The instance starts equal to the
    /// template, and the template's current values become its defaults.
    pub fn instantiate(&mut self, template: EntityId) -> Option<EntityId> {
        let source = self.entities.get(&template)?;
        let values = source.field_values();
        let name = source.name.clone();
        let type_tag = source.schema.type_tag.clone();

        let id = self.spawn_named(&type_tag, name)?;
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.template = Some(values);
        }
        Some(id)
    }

    /// Assign a field, checked against the entity's schema.
    pub fn set(&mut self, id: EntityId, field: &str, value: impl Into<FieldValue>) -> Result<()> {
        self.entities
            .get_mut(&id)
            .ok_or(Error::EntityNotFound(id))?
            .set_field(field, value.into())
    }

    /// Whether the lock marker is shown on `id`.
    pub fn is_lock_marked(&self, id: EntityId) -> bool {
        self.lock_markers.contains(&id)
    }

    fn detach(&mut self, id: EntityId) {
        let parent = self.entities.get(&id).and_then(|e| e.parent);
        if let Some(parent) = parent.and_then(|p| self.entities.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
    }
}

impl World for Scene {
    fn entity(&self, id: EntityId) -> Option<&dyn EntityAdapter> {
        self.entities.get(&id).map(|e| e as &dyn EntityAdapter)
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut dyn EntityAdapter> {
        self.entities
            .get_mut(&id)
            .map(|e| e as &mut dyn EntityAdapter)
    }

    fn entities(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    fn parent_of(&self, id: EntityId) -> Option<EntityId> {
        self.entities.get(&id)?.parent
    }

    fn natural_key(&self, id: EntityId) -> Option<NaturalKey> {
        let entity = self.entities.get(&id)?;
        Some(NaturalKey {
            scope: entity.scope.clone(),
            name: entity.name.clone(),
            parent: entity.parent,
            transform: entity.local_transform(),
        })
    }

    fn spawn(&mut self, type_tag: &str) -> Option<EntityId> {
        self.spawn_named(type_tag, String::new())
    }

    /// Removes the entity and its descendants.
    fn despawn(&mut self, id: EntityId) -> bool {
        if !self.entities.contains_key(&id) {
            return false;
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(entity) = self.entities.remove(&current) {
                stack.extend(entity.children);
                self.lock_markers.remove(&current);
            }
        }
        true
    }

    fn set_parent(&mut self, id: EntityId, parent: Option<EntityId>, index: Option<usize>) -> bool {
        if !self.entities.contains_key(&id)
            || parent.is_some_and(|p| p == id || !self.entities.contains_key(&p))
        {
            return false;
        }
        self.detach(id);
        if let Some(parent_entity) = parent.and_then(|p| self.entities.get_mut(&p)) {
            let len = parent_entity.children.len();
            parent_entity.children.insert(index.unwrap_or(len).min(len), id);
        }
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.parent = parent;
        }
        true
    }

    fn set_lock_marker(&mut self, id: EntityId, locked: bool) {
        if locked && self.entities.contains_key(&id) {
            self.lock_markers.insert(id);
        } else {
            self.lock_markers.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDef, FieldType};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(1).with(EntitySchema::new(
            "node",
            vec![
                FieldDef::synced("position", FieldType::Vector3, FieldValue::Vector3([0.0; 3])),
                FieldDef::synced("label", FieldType::String, FieldValue::Str(String::new())),
                FieldDef::synced("target", FieldType::Entity, FieldValue::Entity(None)),
            ],
        ))
    }

    #[test]
    fn fresh_entity_reads_defaults() {
        let mut scene = Scene::new(registry(), "level-1");
        let id = scene.spawn("node").unwrap();
        let entity = scene.get(id).unwrap();

        assert_eq!(entity.get_field("label"), Some(FieldValue::Str(String::new())));
        assert!(entity.is_default("label"));
        assert_eq!(entity.list_fields(), vec!["position", "label", "target"]);
        assert!(scene.spawn("unknown").is_none());
    }

    #[test]
    fn set_field_validates_schema() {
        let mut scene = Scene::new(registry(), "level-1");
        let id = scene.spawn("node").unwrap();

        assert!(scene.set(id, "label", "lamp").is_ok());
        assert!(matches!(
            scene.set(id, "label", true),
            Err(Error::TypeMismatch { .. })
        ));
        assert_eq!(
            scene.set(id, "missing", true).unwrap_err(),
            Error::FieldNotFound("missing".into())
        );
        assert_eq!(scene.set(99, "label", "x").unwrap_err(), Error::EntityNotFound(99));
    }

    #[test]
    fn instance_defaults_come_from_template() {
        let mut scene = Scene::new(registry(), "level-1");
        let template = scene.spawn_named("node", "prefab").unwrap();
        scene.set(template, "label", "lamp").unwrap();

        let instance = scene.instantiate(template).unwrap();
        let entity = scene.get(instance).unwrap();
        assert!(entity.is_instance());
        assert!(entity.is_default("label"));
        assert_eq!(entity.default_field("label"), Some(FieldValue::from("lamp")));

        scene.set(instance, "label", "desk lamp").unwrap();
        assert!(!scene.get(instance).unwrap().is_default("label"));
    }

    #[test]
    fn hierarchy_and_despawn() {
        let mut scene = Scene::new(registry(), "level-1");
        let root = scene.spawn("node").unwrap();
        let child = scene.spawn("node").unwrap();
        let grandchild = scene.spawn("node").unwrap();

        assert!(scene.set_parent(child, Some(root), None));
        assert!(scene.set_parent(grandchild, Some(child), None));
        assert_eq!(scene.parent_of(grandchild), Some(child));
        assert_eq!(scene.get(root).unwrap().children(), &[child]);

        assert!(scene.despawn(child));
        assert!(!scene.is_alive(grandchild));
        assert!(scene.get(root).unwrap().children().is_empty());
        assert!(!scene.despawn(child));
    }

    #[test]
    fn natural_key_includes_transform() {
        let mut scene = Scene::new(registry(), "level-1");
        let id = scene.spawn_named("node", "lamp").unwrap();
        scene.set(id, "position", [1.0f32, 2.0, 3.0]).unwrap();

        let key = scene.natural_key(id).unwrap();
        assert_eq!(key.scope, "level-1");
        assert_eq!(key.name, "lamp");
        assert_eq!(key.transform, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn lock_markers() {
        let mut scene = Scene::new(registry(), "level-1");
        let id = scene.spawn("node").unwrap();
        scene.set_lock_marker(id, true);
        assert!(scene.is_lock_marked(id));
        scene.set_lock_marker(id, false);
        assert!(!scene.is_lock_marked(id));
    }
}
