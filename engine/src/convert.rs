//! Conversion between native field values and properties.
//!
//! Entity references go through the identity map. A reference to a dead
//! entity converts to an explicit null. A live entity with no replicated
//! object cannot be expressed, so it converts to [`Converted::Unchanged`] and
//! the caller keeps whatever the tree held before.

use crate::{
    Dictionary, EntityId, FieldValue, IdentityMap, List, Property, PropertyData, StringTable,
    ValueData, World,
};
use std::fmt;

/// Outcome of converting a native value.
#[derive(Debug, Clone)]
pub enum Converted {
    Property(Property),
    /// Keep the current value; the native value has no representation.
    Unchanged,
}

impl Converted {
    pub fn into_property(self) -> Option<Property> {
        match self {
            Converted::Property(p) => Some(p),
            Converted::Unchanged => None,
        }
    }
}

/// Converts field values using an identity map for entity references.
#[derive(Clone, Copy)]
pub struct Converter<'a> {
    identity: &'a IdentityMap,
    /// Liveness source for reference targets. Without one every unmapped
    /// target is assumed alive.
    world: Option<&'a dyn World>,
}

impl fmt::Debug for Converter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("identity", &self.identity)
            .field("checks_liveness", &self.world.is_some())
            .finish()
    }
}

impl<'a> Converter<'a> {
    pub fn new(identity: &'a IdentityMap) -> Self {
        Self {
            identity,
            world: None,
        }
    }

    /// A converter that turns references to dead entities into null.
    pub fn with_world(identity: &'a IdentityMap, world: &'a dyn World) -> Self {
        Self {
            identity,
            world: Some(world),
        }
    }

    fn is_dead(&self, entity: EntityId) -> bool {
        self.world.is_some_and(|world| !world.is_alive(entity))
    }

    /// Convert a native value, interning strings into `strings`.
    pub fn to_property(&self, value: &FieldValue, strings: &mut StringTable) -> Converted {
        let property = match value {
            FieldValue::Bool(v) => Property::value(*v),
            FieldValue::Int(v) => Property::value(*v),
            FieldValue::Float(v) => Property::value(*v),
            FieldValue::Str(s) => Property::string(strings.intern(s)),
            FieldValue::Vector3(v) => Property::value(ValueData::Vector3(*v)),
            FieldValue::Bytes(b) => Property::value(ValueData::Bytes(b.clone())),
            FieldValue::Entity(None) => Property::null(),
            FieldValue::Entity(Some(entity)) => match self.identity.object_of(*entity) {
                Some(object) => Property::reference(object),
                None if self.is_dead(*entity) => {
                    tracing::trace!(entity, "reference to dead entity cleared");
                    Property::null()
                }
                None => {
                    tracing::trace!(entity, "reference to unsynced entity left unchanged");
                    return Converted::Unchanged;
                }
            },
            FieldValue::List(items) => {
                let mut list = List::new();
                for item in items {
                    match self.to_property(item, strings) {
                        Converted::Property(p) => list.push(p),
                        Converted::Unchanged => return Converted::Unchanged,
                    }
                }
                Property::from(list)
            }
            FieldValue::Struct(fields) => {
                let mut dict = Dictionary::new();
                for (name, field) in fields {
                    if let Converted::Property(p) = self.to_property(field, strings) {
                        dict.insert(name.clone(), p);
                    }
                }
                Property::from(dict)
            }
            FieldValue::Opaque => return Converted::Unchanged,
        };
        Converted::Property(property)
    }

    /// Convert a property back to a native value. Returns `None` when the
    /// property has no native counterpart (an unknown string id, a vector
    /// width the native model lacks).
    pub fn from_property(&self, property: &Property, strings: &StringTable) -> Option<FieldValue> {
        match property.data() {
            PropertyData::Value(value) => from_value(value.data()),
            PropertyData::String(id) => strings.get(*id).map(|s| FieldValue::Str(s.to_string())),
            PropertyData::Reference(object) => {
                Some(FieldValue::Entity(self.identity.entity_of(*object)))
            }
            PropertyData::Null => Some(FieldValue::Entity(None)),
            PropertyData::List(list) => list
                .iter()
                .map(|p| self.from_property(p, strings))
                .collect::<Option<Vec<_>>>()
                .map(FieldValue::List),
            PropertyData::Dictionary(dict) => dict
                .iter()
                .map(|(name, p)| Some((name.clone(), self.from_property(p, strings)?)))
                .collect::<Option<_>>()
                .map(FieldValue::Struct),
        }
    }
}

fn from_value(data: &ValueData) -> Option<FieldValue> {
    let value = match data {
        ValueData::Bool(v) => FieldValue::Bool(*v),
        ValueData::Byte(v) => FieldValue::Int(i64::from(*v)),
        ValueData::Int(v) => FieldValue::Int(i64::from(*v)),
        ValueData::UInt(v) => FieldValue::Int(i64::from(*v)),
        ValueData::Long(v) => FieldValue::Int(*v),
        ValueData::ULong(v) => FieldValue::Int(i64::try_from(*v).ok()?),
        ValueData::Float(v) => FieldValue::Float(f64::from(*v)),
        ValueData::Double(v) => FieldValue::Float(*v),
        ValueData::Vector3(v) => FieldValue::Vector3(*v),
        ValueData::Bytes(b) => FieldValue::Bytes(b.clone()),
        ValueData::IntArray(items) => {
            FieldValue::List(items.iter().map(|v| FieldValue::Int(i64::from(*v))).collect())
        }
        ValueData::FloatArray(items) => FieldValue::List(
            items
                .iter()
                .map(|v| FieldValue::Float(f64::from(*v)))
                .collect(),
        ),
        ValueData::Vector3Array(items) => {
            FieldValue::List(items.iter().map(|v| FieldValue::Vector3(*v)).collect())
        }
        ValueData::Vector2(_)
        | ValueData::Vector4(_)
        | ValueData::Quaternion(_)
        | ValueData::Color(_) => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntitySchema, Scene, SchemaRegistry};
    use std::collections::BTreeMap;

    #[test]
    fn scalars_round_trip() {
        let identity = IdentityMap::new();
        let converter = Converter::new(&identity);
        let mut strings = StringTable::new();

        for value in [
            FieldValue::Bool(true),
            FieldValue::Int(-7),
            FieldValue::Float(0.5),
            FieldValue::from("hello"),
            FieldValue::Vector3([1.0, 2.0, 3.0]),
            FieldValue::Bytes(vec![1, 2, 3]),
        ] {
            let property = converter.to_property(&value, &mut strings).into_property().unwrap();
            assert_eq!(converter.from_property(&property, &strings), Some(value));
        }
    }

    #[test]
    fn entity_references_use_identity_map() {
        let mut identity = IdentityMap::new();
        identity.add(40, 4);
        let converter = Converter::new(&identity);
        let mut strings = StringTable::new();

        let mapped = converter.to_property(&FieldValue::Entity(Some(4)), &mut strings);
        assert_eq!(mapped.into_property().unwrap().as_reference(), Some(40));

        let unmapped = converter.to_property(&FieldValue::Entity(Some(5)), &mut strings);
        assert!(matches!(unmapped, Converted::Unchanged));

        let cleared = converter.to_property(&FieldValue::Entity(None), &mut strings);
        assert!(cleared.into_property().unwrap().is_null());
    }

    #[test]
    fn dead_reference_target_becomes_null() {
        let registry = SchemaRegistry::new(1).with(EntitySchema::new("node", Vec::new()));
        let mut scene = Scene::new(registry, "test");
        let alive = scene.spawn("node").unwrap();
        let dead = scene.spawn("node").unwrap();
        scene.despawn(dead);

        let identity = IdentityMap::new();
        let converter = Converter::with_world(&identity, &scene);
        let mut strings = StringTable::new();

        let cleared = converter.to_property(&FieldValue::Entity(Some(dead)), &mut strings);
        assert!(cleared.into_property().unwrap().is_null());

        let pending = converter.to_property(&FieldValue::Entity(Some(alive)), &mut strings);
        assert!(matches!(pending, Converted::Unchanged));

        // Never spawned at all.
        let missing = converter.to_property(&FieldValue::Entity(Some(500)), &mut strings);
        assert!(missing.into_property().unwrap().is_null());
    }

    #[test]
    fn dangling_reference_reads_as_null_entity() {
        let identity = IdentityMap::new();
        let converter = Converter::new(&identity);
        let strings = StringTable::new();

        assert_eq!(
            converter.from_property(&Property::reference(99), &strings),
            Some(FieldValue::Entity(None))
        );
    }

    #[test]
    fn opaque_poisons_enclosing_list() {
        let identity = IdentityMap::new();
        let converter = Converter::new(&identity);
        let mut strings = StringTable::new();

        let list = FieldValue::List(vec![FieldValue::Int(1), FieldValue::Opaque]);
        assert!(matches!(
            converter.to_property(&list, &mut strings),
            Converted::Unchanged
        ));
    }

    #[test]
    fn struct_skips_opaque_members() {
        let identity = IdentityMap::new();
        let converter = Converter::new(&identity);
        let mut strings = StringTable::new();

        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), FieldValue::Int(1));
        fields.insert("b".to_string(), FieldValue::Opaque);
        let property = converter
            .to_property(&FieldValue::Struct(fields), &mut strings)
            .into_property()
            .unwrap();

        let dict = property.as_dictionary().unwrap();
        assert_eq!(dict.len(), 1);
        assert!(dict.contains("a"));
    }

    #[test]
    fn unknown_string_id_has_no_native_value() {
        let identity = IdentityMap::new();
        let converter = Converter::new(&identity);
        assert_eq!(converter.from_property(&Property::string(12), &StringTable::new()), None);
    }

    #[test]
    fn narrow_values_widen() {
        let identity = IdentityMap::new();
        let converter = Converter::new(&identity);
        let strings = StringTable::new();

        let property = Property::value(ValueData::Float(1.5));
        assert_eq!(converter.from_property(&property, &strings), Some(FieldValue::Float(1.5)));

        let property = Property::value(ValueData::IntArray(vec![1, 2]));
        assert_eq!(
            converter.from_property(&property, &strings),
            Some(FieldValue::List(vec![FieldValue::Int(1), FieldValue::Int(2)]))
        );
    }
}
