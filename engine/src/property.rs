//! Replicated property tree.
//!
//! A [`Property`] is one node of the generic tree shared over a session. Each
//! replicated object owns exactly one root property (normally a dictionary) and
//! every other node has exactly one parent, enforced by ownership: a dictionary
//! entry is reachable under a single name, a list element under a single index.
//!
//! Nodes carry a [`Serial`] that identifies them for their whole lifetime. The
//! merge code in [`crate::diff`] preserves serials when it updates a tree in
//! place, which is how callers can tell "modified" apart from "replaced".

use crate::{error::Result, Error, ObjectId, StringId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Identity of a property node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Serial(u64);

fn next_serial() -> Serial {
    Serial(NEXT_SERIAL.fetch_add(1, Ordering::Relaxed))
}

/// Variant tag of a property. Never changes after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Dictionary,
    List,
    Value,
    Reference,
    String,
    Null,
}

impl PropertyType {
    /// Stable numeric tag, folded into checksums.
    pub fn tag(self) -> u32 {
        match self {
            PropertyType::Dictionary => 1,
            PropertyType::List => 2,
            PropertyType::Value => 3,
            PropertyType::Reference => 4,
            PropertyType::String => 5,
            PropertyType::Null => 6,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Dictionary => write!(f, "Dictionary"),
            PropertyType::List => write!(f, "List"),
            PropertyType::Value => write!(f, "Value"),
            PropertyType::Reference => write!(f, "Reference"),
            PropertyType::String => write!(f, "String"),
            PropertyType::Null => write!(f, "Null"),
        }
    }
}

/// Scalar or fixed-size array payload of a [`Value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ValueData {
    Bool(bool),
    Byte(u8),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    Quaternion([f32; 4]),
    Color([f32; 4]),
    Bytes(Vec<u8>),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    Vector3Array(Vec<[f32; 3]>),
}

impl ValueData {
    /// Name of the payload type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueData::Bool(_) => "Bool",
            ValueData::Byte(_) => "Byte",
            ValueData::Int(_) => "Int",
            ValueData::UInt(_) => "UInt",
            ValueData::Long(_) => "Long",
            ValueData::ULong(_) => "ULong",
            ValueData::Float(_) => "Float",
            ValueData::Double(_) => "Double",
            ValueData::Vector2(_) => "Vector2",
            ValueData::Vector3(_) => "Vector3",
            ValueData::Vector4(_) => "Vector4",
            ValueData::Quaternion(_) => "Quaternion",
            ValueData::Color(_) => "Color",
            ValueData::Bytes(_) => "Bytes",
            ValueData::IntArray(_) => "IntArray",
            ValueData::FloatArray(_) => "FloatArray",
            ValueData::Vector3Array(_) => "Vector3Array",
        }
    }

    /// Stable numeric tag of the payload type, folded into checksums.
    pub fn type_tag(&self) -> u32 {
        match self {
            ValueData::Bool(_) => 1,
            ValueData::Byte(_) => 2,
            ValueData::Int(_) => 3,
            ValueData::UInt(_) => 4,
            ValueData::Long(_) => 5,
            ValueData::ULong(_) => 6,
            ValueData::Float(_) => 7,
            ValueData::Double(_) => 8,
            ValueData::Vector2(_) => 9,
            ValueData::Vector3(_) => 10,
            ValueData::Vector4(_) => 11,
            ValueData::Quaternion(_) => 12,
            ValueData::Color(_) => 13,
            ValueData::Bytes(_) => 14,
            ValueData::IntArray(_) => 15,
            ValueData::FloatArray(_) => 16,
            ValueData::Vector3Array(_) => 17,
        }
    }

    /// Element count of array payloads; `None` for scalars.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            ValueData::Bytes(v) => Some(v.len()),
            ValueData::IntArray(v) => Some(v.len()),
            ValueData::FloatArray(v) => Some(v.len()),
            ValueData::Vector3Array(v) => Some(v.len()),
            _ => None,
        }
    }
}

macro_rules! value_data_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ValueData {
                fn from(v: $ty) -> Self {
                    ValueData::$variant(v)
                }
            }
        )*
    };
}

value_data_from! {
    bool => Bool,
    u8 => Byte,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    u64 => ULong,
    f32 => Float,
    f64 => Double,
    [f32; 3] => Vector3,
    Vec<u8> => Bytes,
    Vec<i32> => IntArray,
    Vec<f32> => FloatArray,
}

/// A tagged leaf value with an optional declared array length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    data: ValueData,
    /// Declared element count; `None` means omitted or unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    declared_len: Option<usize>,
}

impl Value {
    /// Create a value whose length is taken from the payload.
    pub fn new(data: impl Into<ValueData>) -> Self {
        let data = data.into();
        let declared_len = data.array_len();
        Self { data, declared_len }
    }

    /// Create a value with an explicit declared length.
    ///
    /// A declared length must agree with the payload: the element count for
    /// arrays, 1 for scalars.
    pub fn with_length(data: impl Into<ValueData>, declared: Option<usize>) -> Result<Self> {
        let data = data.into();
        if let Some(declared) = declared {
            let actual = data.array_len().unwrap_or(1);
            if declared != actual {
                return Err(Error::LengthMismatch { declared, actual });
            }
        }
        Ok(Self {
            data,
            declared_len: declared,
        })
    }

    /// The payload.
    pub fn data(&self) -> &ValueData {
        &self.data
    }

    /// Declared array length, or -1 when omitted.
    pub fn declared_length(&self) -> i64 {
        self.declared_len.map_or(-1, |n| n as i64)
    }

    /// Replace the payload, keeping the declared length consistent with it.
    pub fn set(&mut self, data: ValueData) {
        if self.declared_len.is_some() {
            self.declared_len = Some(data.array_len().unwrap_or(1));
        }
        self.data = data;
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

/// Name-keyed children of a dictionary property.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dictionary {
    fields: HashMap<String, Property>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.fields.get_mut(name)
    }

    /// Set a field, returning the property it replaced.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        property: impl Into<Property>,
    ) -> Option<Property> {
        self.fields.insert(name.into(), property.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Property> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Property)> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Property)> {
        self.fields.iter_mut()
    }

    /// Field names, sorted.
    pub fn sorted_names(&self) -> Vec<&String> {
        let mut names: Vec<_> = self.fields.keys().collect();
        names.sort();
        names
    }

    pub(crate) fn retain(&mut self, f: impl FnMut(&String, &mut Property) -> bool) {
        self.fields.retain(f);
    }
}

/// Ordered children of a list property.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct List {
    items: Vec<Property>,
}

impl List {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&Property> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Property> {
        self.items.get_mut(index)
    }

    /// Replace the element at `index`, returning the old one.
    pub fn set(&mut self, index: usize, property: impl Into<Property>) -> Option<Property> {
        let slot = self.items.get_mut(index)?;
        Some(std::mem::replace(slot, property.into()))
    }

    pub fn push(&mut self, property: impl Into<Property>) {
        self.items.push(property.into());
    }

    /// Insert at `index`; an index past the end appends.
    pub fn insert(&mut self, index: usize, property: impl Into<Property>) {
        let index = index.min(self.items.len());
        self.items.insert(index, property.into());
    }

    pub fn remove(&mut self, index: usize) -> Option<Property> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Insert a run of elements starting at `index`.
    pub fn add_range(&mut self, index: usize, properties: impl IntoIterator<Item = Property>) {
        let index = index.min(self.items.len());
        self.items.splice(index..index, properties);
    }

    /// Remove up to `count` elements starting at `index`.
    pub fn remove_range(&mut self, index: usize, count: usize) -> Vec<Property> {
        let start = index.min(self.items.len());
        let end = index.saturating_add(count).min(self.items.len());
        self.items.drain(start..end).collect()
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Property> {
        self.items.iter()
    }
}

impl FromIterator<Property> for List {
    fn from_iter<I: IntoIterator<Item = Property>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Payload of a property node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PropertyData {
    Dictionary(Dictionary),
    List(List),
    Value(Value),
    /// Id of another replicated object.
    Reference(ObjectId),
    /// Id of an entry in the session's string table.
    String(StringId),
    Null,
}

/// One node of the replicated property tree.
#[derive(Debug)]
pub struct Property {
    serial: Serial,
    data: PropertyData,
}

// Serials are local identity and never leave the process.
impl Serialize for Property {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Property {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        PropertyData::deserialize(deserializer).map(Property::new)
    }
}

impl Clone for Property {
    /// Clones are new nodes and get fresh serials.
    fn clone(&self) -> Self {
        Self::new(self.data.clone())
    }
}

impl Property {
    pub fn new(data: PropertyData) -> Self {
        Self {
            serial: next_serial(),
            data,
        }
    }

    pub fn dictionary() -> Self {
        Self::new(PropertyData::Dictionary(Dictionary::new()))
    }

    pub fn list() -> Self {
        Self::new(PropertyData::List(List::new()))
    }

    pub fn value(data: impl Into<ValueData>) -> Self {
        Self::new(PropertyData::Value(Value::new(data)))
    }

    pub fn reference(id: ObjectId) -> Self {
        Self::new(PropertyData::Reference(id))
    }

    pub fn string(id: StringId) -> Self {
        Self::new(PropertyData::String(id))
    }

    pub fn null() -> Self {
        Self::new(PropertyData::Null)
    }

    pub fn serial(&self) -> Serial {
        self.serial
    }

    pub fn property_type(&self) -> PropertyType {
        match self.data {
            PropertyData::Dictionary(_) => PropertyType::Dictionary,
            PropertyData::List(_) => PropertyType::List,
            PropertyData::Value(_) => PropertyType::Value,
            PropertyData::Reference(_) => PropertyType::Reference,
            PropertyData::String(_) => PropertyType::String,
            PropertyData::Null => PropertyType::Null,
        }
    }

    pub fn data(&self) -> &PropertyData {
        &self.data
    }

    /// Mutable payload access. Crate-internal so the variant tag cannot be
    /// swapped from outside; the merge code only reassigns same-variant data.
    pub(crate) fn data_mut(&mut self) -> &mut PropertyData {
        &mut self.data
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match &self.data {
            PropertyData::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dictionary_mut(&mut self) -> Option<&mut Dictionary> {
        match &mut self.data {
            PropertyData::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match &self.data {
            PropertyData::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut List> {
        match &mut self.data {
            PropertyData::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match &self.data {
            PropertyData::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self.data {
            PropertyData::Reference(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<StringId> {
        match self.data {
            PropertyData::String(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.data, PropertyData::Null)
    }

    /// Resolve a descendant by path. The empty path resolves to `self`.
    pub fn at(&self, path: &PropertyPath) -> Option<&Property> {
        path.segments().iter().try_fold(self, |node, segment| match segment {
            PathSegment::Field(name) => node.as_dictionary()?.get(name),
            PathSegment::Index(i) => node.as_list()?.get(*i),
        })
    }

    pub fn at_mut(&mut self, path: &PropertyPath) -> Option<&mut Property> {
        let mut node = self;
        for segment in path.segments() {
            node = match segment {
                PathSegment::Field(name) => node.as_dictionary_mut()?.get_mut(name)?,
                PathSegment::Index(i) => node.as_list_mut()?.get_mut(*i)?,
            };
        }
        Some(node)
    }

    /// Depth-first, pre-order traversal of all descendants (not `self`).
    ///
    /// Each call starts a fresh traversal.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack = Vec::new();
        push_children(self, &mut stack);
        Descendants { stack }
    }
}

impl From<PropertyData> for Property {
    fn from(data: PropertyData) -> Self {
        Property::new(data)
    }
}

impl From<Value> for Property {
    fn from(value: Value) -> Self {
        Property::new(PropertyData::Value(value))
    }
}

impl From<ValueData> for Property {
    fn from(data: ValueData) -> Self {
        Property::from(Value::new(data))
    }
}

impl From<Dictionary> for Property {
    fn from(dict: Dictionary) -> Self {
        Property::new(PropertyData::Dictionary(dict))
    }
}

impl From<List> for Property {
    fn from(list: List) -> Self {
        Property::new(PropertyData::List(list))
    }
}

fn push_children<'a>(node: &'a Property, stack: &mut Vec<&'a Property>) {
    match &node.data {
        PropertyData::Dictionary(d) => stack.extend(d.fields.values()),
        // Reversed so the first element is popped first.
        PropertyData::List(l) => stack.extend(l.items.iter().rev()),
        _ => {}
    }
}

/// Iterator returned by [`Property::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a Property>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Property;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        push_children(node, &mut self.stack);
        Some(node)
    }
}

/// One step of a [`PropertyPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Location of a property inside an object's root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyPath(Vec<PathSegment>);

impl PropertyPath {
    /// The path of the root property.
    pub fn root() -> Self {
        Self::default()
    }

    /// Path of a top-level field.
    pub fn field(name: impl Into<String>) -> Self {
        Self(vec![PathSegment::Field(name.into())])
    }

    /// Extend with a field name.
    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.0.push(PathSegment::Field(name.into()));
        self
    }

    /// Extend with a list index.
    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathSegment::Index(index));
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of the parent property; the root is its own parent.
    pub fn parent(&self) -> PropertyPath {
        let mut segments = self.0.clone();
        segments.pop();
        Self(segments)
    }

    /// Name of the addressed property if its parent is a dictionary.
    pub fn name(&self) -> Option<&str> {
        match self.0.last()? {
            PathSegment::Field(name) => Some(name),
            PathSegment::Index(_) => None,
        }
    }

    /// Index of the addressed property if its parent is a list.
    pub fn position(&self) -> Option<usize> {
        match self.0.last()? {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Field(_) => None,
        }
    }

    /// Name of the top-level field this path lives under.
    pub fn top_field(&self) -> Option<&str> {
        match self.0.first()? {
            PathSegment::Field(name) => Some(name),
            PathSegment::Index(_) => None,
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{name}")?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Interned strings shared over a session.
///
/// The session owns the authoritative table; this is the local mirror that
/// string properties resolve against.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    strings: Vec<Option<String>>,
    ids: HashMap<String, StringId>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `text`, adding an entry if needed.
    pub fn intern(&mut self, text: &str) -> StringId {
        if let Some(id) = self.ids.get(text) {
            return *id;
        }
        let id = self.strings.len() as StringId;
        self.strings.push(Some(text.to_string()));
        self.ids.insert(text.to_string(), id);
        id
    }

    /// Install an entry announced by the session under a fixed id.
    pub fn set(&mut self, id: StringId, text: impl Into<String>) {
        let text = text.into();
        let slot = id as usize;
        if self.strings.len() <= slot {
            self.strings.resize(slot + 1, None);
        }
        if let Some(old) = self.strings[slot].take() {
            self.ids.remove(&old);
        }
        self.ids.insert(text.clone(), id);
        self.strings[slot] = Some(text);
    }

    pub fn get(&self, id: StringId) -> Option<&str> {
        self.strings.get(id as usize)?.as_deref()
    }

    pub fn id_of(&self, text: &str) -> Option<StringId> {
        self.ids.get(text).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Property {
        let mut inner = List::new();
        inner.push(Property::value(1));
        inner.push(Property::value(2));

        let mut dict = Dictionary::new();
        dict.insert("name", Property::string(0));
        dict.insert("points", inner);
        Property::from(dict)
    }

    #[test]
    fn value_length_must_match_payload() {
        assert!(Value::with_length(vec![1u8, 2, 3], Some(3)).is_ok());
        assert!(Value::with_length(vec![1u8, 2, 3], None).is_ok());
        assert_eq!(
            Value::with_length(vec![1.0f32, 2.0], Some(3)).unwrap_err(),
            Error::LengthMismatch {
                declared: 3,
                actual: 2
            }
        );
        assert!(Value::with_length(true, Some(1)).is_ok());
    }

    #[test]
    fn declared_length_defaults() {
        assert_eq!(Value::new(5).declared_length(), -1);
        assert_eq!(Value::new(vec![1, 2]).declared_length(), 2);
        let omitted = Value::with_length(vec![1, 2], None).unwrap();
        assert_eq!(omitted.declared_length(), -1);
    }

    #[test]
    fn set_keeps_declared_length_consistent() {
        let mut value = Value::new(vec![1, 2]);
        value.set(ValueData::IntArray(vec![1, 2, 3]));
        assert_eq!(value.declared_length(), 3);
    }

    #[test]
    fn type_tag_is_fixed() {
        let p = Property::value(1.5f32);
        assert_eq!(p.property_type(), PropertyType::Value);
        assert_eq!(Property::null().property_type(), PropertyType::Null);
        assert_eq!(sample().property_type(), PropertyType::Dictionary);
    }

    #[test]
    fn clone_gets_fresh_serial() {
        let p = sample();
        let q = p.clone();
        assert_ne!(p.serial(), q.serial());
    }

    #[test]
    fn descendants_preorder() {
        let root = sample();
        let all: Vec<_> = root.descendants().collect();
        assert_eq!(all.len(), 4);

        // The list's elements follow the list itself, in order.
        let list_pos = all
            .iter()
            .position(|p| p.property_type() == PropertyType::List)
            .unwrap();
        assert_eq!(all[list_pos + 1].as_value().unwrap().data(), &ValueData::Int(1));
        assert_eq!(all[list_pos + 2].as_value().unwrap().data(), &ValueData::Int(2));

        // Restartable.
        assert_eq!(root.descendants().count(), 4);
    }

    #[test]
    fn list_ranges() {
        let mut list: List = (0..5).map(Property::value).collect();
        list.add_range(1, vec![Property::value(10), Property::value(11)]);
        assert_eq!(list.len(), 7);
        assert_eq!(list.get(1).unwrap().as_value().unwrap().data(), &ValueData::Int(10));

        let removed = list.remove_range(1, 2);
        assert_eq!(removed.len(), 2);
        assert_eq!(list.len(), 5);

        assert!(list.remove(99).is_none());
        assert_eq!(list.remove_range(4, 10).len(), 1);
    }

    #[test]
    fn path_resolution() {
        let root = sample();
        let path = PropertyPath::field("points").index(1);
        let p = root.at(&path).unwrap();
        assert_eq!(p.as_value().unwrap().data(), &ValueData::Int(2));
        assert_eq!(path.position(), Some(1));
        assert_eq!(path.parent().name(), Some("points"));
        assert_eq!(path.top_field(), Some("points"));
        assert_eq!(path.to_string(), "points[1]");
        assert!(root.at(&PropertyPath::field("missing")).is_none());
    }

    #[test]
    fn string_table_interns() {
        let mut table = StringTable::new();
        let a = table.intern("alpha");
        let b = table.intern("beta");
        assert_ne!(a, b);
        assert_eq!(table.intern("alpha"), a);
        assert_eq!(table.get(b), Some("beta"));

        table.set(7, "remote");
        assert_eq!(table.get(7), Some("remote"));
        assert_eq!(table.id_of("remote"), Some(7));
        assert_eq!(table.get(5), None);
    }

    #[test]
    fn serialization_roundtrip_keeps_shape() {
        let root = sample();
        let json = serde_json::to_string(&root).unwrap();
        let parsed: Property = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.property_type(), PropertyType::Dictionary);
        assert_eq!(parsed.descendants().count(), 4);
    }
}
