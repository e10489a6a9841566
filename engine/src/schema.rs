//! Entity schemas.
//!
//! A schema lists the fields of one native entity kind together with their
//! types and defaults. It replaces reflective field walking: everything the
//! diff engine knows about an entity comes from its schema.

use crate::{error::Result, Error, FieldValue, SchemaVersion, TypeTag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    Int,
    Float,
    String,
    Vector3,
    Bytes,
    /// Reference to another entity.
    Entity,
    List,
    Struct,
    /// Anything, including values that cannot be replicated.
    Any,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::String => write!(f, "String"),
            FieldType::Vector3 => write!(f, "Vector3"),
            FieldType::Bytes => write!(f, "Bytes"),
            FieldType::Entity => write!(f, "Entity"),
            FieldType::List => write!(f, "List"),
            FieldType::Struct => write!(f, "Struct"),
            FieldType::Any => write!(f, "Any"),
        }
    }
}

/// Definition of a field on an entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// Value on a freshly constructed entity
    pub default: FieldValue,
    /// Whether the field is replicated
    pub synced: bool,
}

impl FieldDef {
    /// A replicated field.
    pub fn synced(name: impl Into<String>, field_type: FieldType, default: FieldValue) -> Self {
        Self {
            name: name.into(),
            field_type,
            default,
            synced: true,
        }
    }

    /// A field that stays local to this replica.
    pub fn local(name: impl Into<String>, field_type: FieldType, default: FieldValue) -> Self {
        Self {
            name: name.into(),
            field_type,
            default,
            synced: false,
        }
    }

    /// Validate a value against this field definition.
    pub fn validate(&self, value: &FieldValue) -> Result<()> {
        let valid = match self.field_type {
            FieldType::Bool => matches!(value, FieldValue::Bool(_)),
            FieldType::Int => matches!(value, FieldValue::Int(_)),
            FieldType::Float => matches!(value, FieldValue::Float(_) | FieldValue::Int(_)),
            FieldType::String => matches!(value, FieldValue::Str(_)),
            FieldType::Vector3 => matches!(value, FieldValue::Vector3(_)),
            FieldType::Bytes => matches!(value, FieldValue::Bytes(_)),
            FieldType::Entity => matches!(value, FieldValue::Entity(_)),
            FieldType::List => matches!(value, FieldValue::List(_)),
            FieldType::Struct => matches!(value, FieldValue::Struct(_)),
            FieldType::Any => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: value.type_name().to_string(),
            })
        }
    }

    /// Coerce a valid value to the field's canonical representation.
    pub(crate) fn normalize(&self, value: FieldValue) -> FieldValue {
        match (self.field_type, value) {
            (FieldType::Float, FieldValue::Int(i)) => FieldValue::Float(i as f64),
            (_, value) => value,
        }
    }
}

/// Schema for one entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    /// Type tag shared by the entity and its replicated object
    pub type_tag: TypeTag,
    /// Field definitions, in declaration order
    pub fields: Vec<FieldDef>,
}

impl EntitySchema {
    pub fn new(type_tag: impl Into<TypeTag>, fields: Vec<FieldDef>) -> Self {
        Self {
            type_tag: type_tag.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of replicated fields, in declaration order.
    pub fn synced_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|f| f.synced).map(|f| f.name.as_str())
    }
}

/// All entity schemas known to a host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRegistry {
    /// Schema version for migrations
    pub version: SchemaVersion,
    /// Entity schemas by type tag
    pub schemas: HashMap<TypeTag, Arc<EntitySchema>>,
}

impl SchemaRegistry {
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            schemas: HashMap::new(),
        }
    }

    /// Add an entity schema, replacing any schema with the same type tag.
    pub fn add(&mut self, schema: EntitySchema) -> &mut Self {
        self.schemas
            .insert(schema.type_tag.clone(), Arc::new(schema));
        self
    }

    /// Builder-style method to add a schema.
    pub fn with(mut self, schema: EntitySchema) -> Self {
        self.add(schema);
        self
    }

    pub fn get(&self, type_tag: &str) -> Option<&Arc<EntitySchema>> {
        self.schemas.get(type_tag)
    }
}
