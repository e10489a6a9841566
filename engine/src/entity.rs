//! Native entity model.
//!
//! The host's object system is seen through two traits: [`EntityAdapter`]
//! exposes one entity's fields, [`World`] looks entities up and performs the
//! structural edits (spawn, despawn, reparent) remote events call for.

use crate::{error::Result, EntityId, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A native field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Vector3([f32; 3]),
    Bytes(Vec<u8>),
    /// Reference to another entity; `None` when unset or destroyed.
    Entity(Option<EntityId>),
    List(Vec<FieldValue>),
    Struct(BTreeMap<String, FieldValue>),
    /// A value with no replicated representation.
    Opaque,
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "Bool",
            FieldValue::Int(_) => "Int",
            FieldValue::Float(_) => "Float",
            FieldValue::Str(_) => "String",
            FieldValue::Vector3(_) => "Vector3",
            FieldValue::Bytes(_) => "Bytes",
            FieldValue::Entity(_) => "Entity",
            FieldValue::List(_) => "List",
            FieldValue::Struct(_) => "Struct",
            FieldValue::Opaque => "Opaque",
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<[f32; 3]> for FieldValue {
    fn from(v: [f32; 3]) -> Self {
        FieldValue::Vector3(v)
    }
}

/// Field access for one native entity.
pub trait EntityAdapter {
    /// Type tag of the entity kind.
    fn type_tag(&self) -> &str;

    /// Names of the fields that are replicated.
    fn list_fields(&self) -> Vec<String>;

    fn get_field(&self, name: &str) -> Option<FieldValue>;

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()>;

    /// The field's default: its value on a freshly constructed entity of the
    /// same kind, or the template's value for template instances.
    fn default_field(&self, name: &str) -> Option<FieldValue>;

    fn is_default(&self, name: &str) -> bool {
        self.get_field(name) == self.default_field(name)
    }

    fn reset_field(&mut self, name: &str) -> Result<()> {
        let default = self
            .default_field(name)
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
        self.set_field(name, default)
    }
}

/// Inputs to deterministic stable-id derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NaturalKey {
    /// Container the entity lives in (a scene, a level, a document)
    pub scope: String,
    pub name: String,
    pub parent: Option<EntityId>,
    /// Local transform components, in a fixed order
    pub transform: Vec<f32>,
}

/// The host's entity graph.
pub trait World {
    fn entity(&self, id: EntityId) -> Option<&dyn EntityAdapter>;

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut dyn EntityAdapter>;

    /// All live entity ids.
    fn entities(&self) -> Vec<EntityId>;

    fn is_alive(&self, id: EntityId) -> bool {
        self.entity(id).is_some()
    }

    fn parent_of(&self, _id: EntityId) -> Option<EntityId> {
        None
    }

    fn natural_key(&self, _id: EntityId) -> Option<NaturalKey> {
        None
    }

    /// Construct a new entity of the given kind, at defaults.
    fn spawn(&mut self, _type_tag: &str) -> Option<EntityId> {
        None
    }

    fn despawn(&mut self, _id: EntityId) -> bool {
        false
    }

    fn set_parent(
        &mut self,
        _id: EntityId,
        _parent: Option<EntityId>,
        _index: Option<usize>,
    ) -> bool {
        false
    }

    /// Show or hide the "locked by someone else" marker on an entity.
    fn set_lock_marker(&mut self, _id: EntityId, _locked: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        value: i64,
    }

    impl EntityAdapter for Counter {
        fn type_tag(&self) -> &str {
            "counter"
        }

        fn list_fields(&self) -> Vec<String> {
            vec!["value".into()]
        }

        fn get_field(&self, name: &str) -> Option<FieldValue> {
            (name == "value").then_some(FieldValue::Int(self.value))
        }

        fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
            match (name, value) {
                ("value", FieldValue::Int(v)) => {
                    self.value = v;
                    Ok(())
                }
                ("value", other) => Err(Error::TypeMismatch {
                    field: name.into(),
                    expected: "Int".into(),
                    got: other.type_name().into(),
                }),
                _ => Err(Error::FieldNotFound(name.into())),
            }
        }

        fn default_field(&self, name: &str) -> Option<FieldValue> {
            (name == "value").then_some(FieldValue::Int(0))
        }
    }

    #[test]
    fn provided_default_helpers() {
        let mut counter = Counter { value: 3 };
        assert!(!counter.is_default("value"));

        counter.reset_field("value").unwrap();
        assert_eq!(counter.value, 0);
        assert!(counter.is_default("value"));

        assert_eq!(
            counter.reset_field("missing").unwrap_err(),
            Error::FieldNotFound("missing".into())
        );
    }

    #[test]
    fn field_value_serialization() {
        let value = FieldValue::Entity(Some(4));
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"type":"entity","value":4}"#);
        let parsed: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
    }
}
