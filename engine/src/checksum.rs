//! Fletcher-64 checksums over property trees.
//!
//! The traversal is canonical: every node folds its type tag first, then its
//! payload. Dictionary fields are visited in name order, so two replicas that
//! built the same dictionary in different orders agree. Excluded field names
//! are skipped at every depth.

use crate::{Property, PropertyData, ReplicatedObject, Session, StringTable, ValueData};
use std::collections::HashSet;

/// Fletcher-64 accumulator over 32-bit words.
///
/// The first accumulator starts at 1 so that an all-zero payload still
/// differs from an empty one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fletcher64 {
    acc1: u32,
    acc2: u32,
}

impl Default for Fletcher64 {
    fn default() -> Self {
        Self::new()
    }
}

impl Fletcher64 {
    pub fn new() -> Self {
        Self { acc1: 1, acc2: 0 }
    }

    pub fn add_word(&mut self, word: u32) {
        self.acc1 = self.acc1.wrapping_add(word);
        self.acc2 = self.acc2.wrapping_add(self.acc1);
    }

    /// Low word first.
    pub fn add_u64(&mut self, value: u64) {
        self.add_word(value as u32);
        self.add_word((value >> 32) as u32);
    }

    /// Length-prefixed, little-endian words, last word zero-padded.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.add_word(bytes.len() as u32);
        for chunk in bytes.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.add_word(u32::from_le_bytes(word));
        }
    }

    pub fn add_str(&mut self, text: &str) {
        self.add_bytes(text.as_bytes());
    }

    pub fn finish(&self) -> u64 {
        u64::from(self.acc1) | (u64::from(self.acc2) << 32)
    }
}

/// Tree checksum with an optional field-name filter.
#[derive(Debug, Clone, Default)]
pub struct Checksum {
    exclude: HashSet<String>,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checksum that skips the named fields wherever they occur.
    pub fn excluding<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exclude(&mut self, name: impl Into<String>) {
        self.exclude.insert(name.into());
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.contains(name)
    }

    pub fn property(&self, property: &Property, strings: &StringTable) -> u64 {
        let mut hasher = Fletcher64::new();
        self.fold_property(&mut hasher, property, strings);
        hasher.finish()
    }

    /// Checksum of one object: its type tag, then its root.
    pub fn object(&self, object: &ReplicatedObject, strings: &StringTable) -> u64 {
        let mut hasher = Fletcher64::new();
        self.fold_object(&mut hasher, object, strings);
        hasher.finish()
    }

    /// Checksum of every object in a session. Roots are visited in id order,
    /// children in their stored order.
    pub fn session(&self, session: &dyn Session) -> u64 {
        let mut hasher = Fletcher64::new();
        let mut roots = session.root_objects();
        roots.sort_unstable();

        let mut stack: Vec<_> = roots.into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            let Some(object) = session.object(id) else {
                continue;
            };
            self.fold_object(&mut hasher, object, session.strings());
            stack.extend(object.children().iter().rev());
        }
        hasher.finish()
    }

    fn fold_object(
        &self,
        hasher: &mut Fletcher64,
        object: &ReplicatedObject,
        strings: &StringTable,
    ) {
        hasher.add_str(object.type_tag());
        self.fold_property(hasher, object.root(), strings);
    }

    fn fold_property(&self, hasher: &mut Fletcher64, property: &Property, strings: &StringTable) {
        hasher.add_word(property.property_type().tag());
        match property.data() {
            PropertyData::Dictionary(dict) => {
                let names: Vec<_> = dict
                    .sorted_names()
                    .into_iter()
                    .filter(|name| !self.is_excluded(name))
                    .collect();
                hasher.add_word(names.len() as u32);
                for name in names {
                    hasher.add_str(name);
                    if let Some(child) = dict.get(name) {
                        self.fold_property(hasher, child, strings);
                    }
                }
            }
            PropertyData::List(list) => {
                hasher.add_word(list.len() as u32);
                for child in list.iter() {
                    self.fold_property(hasher, child, strings);
                }
            }
            PropertyData::Value(value) => {
                hasher.add_word(value.data().type_tag());
                fold_value(hasher, value.data());
            }
            PropertyData::Reference(id) => hasher.add_word(*id),
            PropertyData::String(id) => match strings.get(*id) {
                Some(text) => hasher.add_str(text),
                None => hasher.add_word(*id),
            },
            PropertyData::Null => {}
        }
    }
}

fn fold_floats(hasher: &mut Fletcher64, values: &[f32]) {
    for v in values {
        hasher.add_word(v.to_bits());
    }
}

fn fold_value(hasher: &mut Fletcher64, data: &ValueData) {
    match data {
        ValueData::Bool(v) => hasher.add_word(u32::from(*v)),
        ValueData::Byte(v) => hasher.add_word(u32::from(*v)),
        ValueData::Int(v) => hasher.add_word(*v as u32),
        ValueData::UInt(v) => hasher.add_word(*v),
        ValueData::Long(v) => hasher.add_u64(*v as u64),
        ValueData::ULong(v) => hasher.add_u64(*v),
        ValueData::Float(v) => hasher.add_word(v.to_bits()),
        ValueData::Double(v) => hasher.add_u64(v.to_bits()),
        ValueData::Vector2(v) => fold_floats(hasher, v),
        ValueData::Vector3(v) => fold_floats(hasher, v),
        ValueData::Vector4(v) | ValueData::Quaternion(v) | ValueData::Color(v) => {
            fold_floats(hasher, v)
        }
        ValueData::Bytes(bytes) => hasher.add_bytes(bytes),
        ValueData::IntArray(items) => {
            hasher.add_word(items.len() as u32);
            for v in items {
                hasher.add_word(*v as u32);
            }
        }
        ValueData::FloatArray(items) => {
            hasher.add_word(items.len() as u32);
            fold_floats(hasher, items);
        }
        ValueData::Vector3Array(items) => {
            hasher.add_word(items.len() as u32);
            for v in items {
                fold_floats(hasher, v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dictionary, MemorySession, ObjectFlags};

    #[test]
    fn empty_input_is_seeded() {
        assert_eq!(Fletcher64::new().finish(), 1);

        let mut hasher = Fletcher64::new();
        hasher.add_bytes(&[]);
        assert_ne!(hasher.finish(), Fletcher64::new().finish());
    }

    #[test]
    fn word_folding() {
        let mut hasher = Fletcher64::new();
        hasher.add_word(1);
        hasher.add_word(2);
        // acc1: 1 -> 2 -> 4, acc2: 0 -> 2 -> 6
        assert_eq!(hasher.finish(), 4 | (6 << 32));
    }

    #[test]
    fn accumulators_wrap() {
        let mut hasher = Fletcher64::new();
        hasher.add_word(u32::MAX);
        assert_eq!(hasher.finish(), 0);
    }

    #[test]
    fn trailing_bytes_are_padded() {
        let mut padded = Fletcher64::new();
        padded.add_word(5);
        padded.add_word(u32::from_le_bytes(*b"abcd"));
        padded.add_word(u32::from_le_bytes([b'e', 0, 0, 0]));

        let mut hasher = Fletcher64::new();
        hasher.add_str("abcde");
        assert_eq!(hasher.finish(), padded.finish());
    }

    #[test]
    fn empty_dictionary_is_nonzero() {
        let strings = StringTable::new();
        let checksum = Checksum::new();
        let a = checksum.property(&Property::dictionary(), &strings);
        let b = checksum.property(&Property::dictionary(), &strings);
        assert_eq!(a, b);
        assert_ne!(a, 0);
    }

    #[test]
    fn insertion_order_is_irrelevant() {
        let strings = StringTable::new();
        let mut first = Dictionary::new();
        first.insert("a", Property::value(1));
        first.insert("b", Property::value(2.5f32));
        let mut second = Dictionary::new();
        second.insert("b", Property::value(2.5f32));
        second.insert("a", Property::value(1));

        let checksum = Checksum::new();
        assert_eq!(
            checksum.property(&first.into(), &strings),
            checksum.property(&second.into(), &strings)
        );
    }

    #[test]
    fn excluded_fields_do_not_count() {
        let strings = StringTable::new();
        let mut with_time = Dictionary::new();
        with_time.insert("name", Property::value(1));
        with_time.insert("time", Property::value(99));
        let mut without = Dictionary::new();
        without.insert("name", Property::value(1));

        let plain = Checksum::new();
        assert_ne!(
            plain.property(&with_time.clone().into(), &strings),
            plain.property(&without.clone().into(), &strings)
        );

        let filtered = Checksum::excluding(["time"]);
        assert_eq!(
            filtered.property(&with_time.into(), &strings),
            filtered.property(&without.into(), &strings)
        );
    }

    #[test]
    fn strings_hash_by_text() {
        let mut left = StringTable::new();
        let mut right = StringTable::new();
        right.intern("padding");
        let a = Property::string(left.intern("hello"));
        let b = Property::string(right.intern("hello"));

        let checksum = Checksum::new();
        assert_eq!(checksum.property(&a, &left), checksum.property(&b, &right));
    }

    #[test]
    fn value_type_matters() {
        let strings = StringTable::new();
        let checksum = Checksum::new();
        assert_ne!(
            checksum.property(&Property::value(1i32), &strings),
            checksum.property(&Property::value(1u32), &strings)
        );
    }

    #[test]
    fn session_checksum_follows_tree() {
        let mut session = MemorySession::new();
        let root = session.create_object("scene", Property::dictionary(), ObjectFlags::NONE, None);
        let before = Checksum::new().session(&session);

        session.create_object("light", Property::dictionary(), ObjectFlags::NONE, Some(root));
        let after = Checksum::new().session(&session);
        assert_ne!(before, after);

        let object = session.object(root).unwrap();
        assert_ne!(
            Checksum::new().object(object, session.strings()),
            Checksum::new().property(object.root(), session.strings())
        );
    }
}
