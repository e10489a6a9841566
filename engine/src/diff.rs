//! Diff and merge between native entities and property dictionaries.
//!
//! # Operations
//!
//! - [`create_properties`] writes a sparse snapshot: only fields that differ
//!   from their default appear in the dictionary.
//! - [`apply_properties`] writes a dictionary back onto an entity. Fields
//!   missing from the dictionary are reset to their default.
//! - [`send_property_changes`] reconciles an existing dictionary with the
//!   entity's current state, merging into existing nodes in place so that
//!   unchanged subtrees keep their identity.
//! - [`copy`] merges one property into another of the same variant.
//!
//! List merging looks one element ahead to recognise a single insertion or
//! removal. Wider edits fall back to overwriting the differing span.

use crate::{
    Converted, Converter, Dictionary, EntityAdapter, List, Property, PropertyData, StringTable,
};

/// Fields touched by [`apply_properties`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Fields set to a new value from the dictionary
    pub changed: Vec<String>,
    /// Fields reset to their default because the dictionary lacks them
    pub reset: Vec<String>,
}

impl ApplyReport {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.reset.is_empty()
    }
}

/// Dictionary entries touched by [`send_property_changes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Entries added or merged
    pub updated: Vec<String>,
    /// Entries pruned because the field returned to its default
    pub removed: Vec<String>,
}

impl SendReport {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }
}

/// What [`apply_field`] did to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldApply {
    Changed,
    Reset,
    Unchanged,
}

/// Snapshot every non-default synced field of `entity` into `dict`.
pub fn create_properties(
    entity: &dyn EntityAdapter,
    dict: &mut Dictionary,
    converter: &Converter<'_>,
    strings: &mut StringTable,
) {
    for name in entity.list_fields() {
        if entity.is_default(&name) {
            continue;
        }
        let Some(value) = entity.get_field(&name) else {
            continue;
        };
        if let Converted::Property(property) = converter.to_property(&value, strings) {
            dict.insert(name, property);
        }
    }
}

/// Write `dict` onto `entity`, resetting fields the dictionary lacks.
pub fn apply_properties(
    entity: &mut dyn EntityAdapter,
    dict: &Dictionary,
    converter: &Converter<'_>,
    strings: &StringTable,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    for name in entity.list_fields() {
        match apply_field(entity, &name, dict.get(&name), converter, strings) {
            FieldApply::Changed => report.changed.push(name),
            FieldApply::Reset => report.reset.push(name),
            FieldApply::Unchanged => {}
        }
    }
    report
}

/// Apply one field. `None` means the field has no entry and returns to its
/// default.
pub fn apply_field(
    entity: &mut dyn EntityAdapter,
    name: &str,
    property: Option<&Property>,
    converter: &Converter<'_>,
    strings: &StringTable,
) -> FieldApply {
    let Some(property) = property else {
        if entity.is_default(name) {
            return FieldApply::Unchanged;
        }
        return match entity.reset_field(name) {
            Ok(()) => FieldApply::Reset,
            Err(err) => {
                tracing::debug!(field = name, error = %err, "could not reset field");
                FieldApply::Unchanged
            }
        };
    };

    let Some(value) = converter.from_property(property, strings) else {
        tracing::trace!(field = name, "property has no native value, skipped");
        return FieldApply::Unchanged;
    };
    if entity.get_field(name).as_ref() == Some(&value) {
        return FieldApply::Unchanged;
    }
    match entity.set_field(name, value) {
        Ok(()) => {
            tracing::trace!(field = name, "field applied");
            FieldApply::Changed
        }
        Err(err) => {
            tracing::debug!(field = name, error = %err, "could not apply field");
            FieldApply::Unchanged
        }
    }
}

/// Reconcile `dict` with the current state of `entity`.
pub fn send_property_changes(
    entity: &dyn EntityAdapter,
    dict: &mut Dictionary,
    converter: &Converter<'_>,
    strings: &mut StringTable,
) -> SendReport {
    let mut report = SendReport::default();
    for name in entity.list_fields() {
        if entity.is_default(&name) {
            if dict.remove(&name).is_some() {
                tracing::trace!(field = %name, "pruned default field");
                report.removed.push(name);
            }
            continue;
        }

        let Some(value) = entity.get_field(&name) else {
            continue;
        };
        let Converted::Property(fresh) = converter.to_property(&value, strings) else {
            continue;
        };

        match dict.get_mut(&name) {
            Some(existing) => {
                if structurally_equal(existing, &fresh) {
                    continue;
                }
                if !copy(existing, &fresh) {
                    *existing = fresh;
                }
            }
            None => {
                dict.insert(name.clone(), fresh);
            }
        }
        tracing::trace!(field = %name, "field sent");
        report.updated.push(name);
    }
    report
}

/// Merge `src` into `dest` in place.
///
/// Returns false, leaving `dest` untouched, when the variants differ and the
/// caller has to replace the node instead.
pub fn copy(dest: &mut Property, src: &Property) -> bool {
    match (dest.data_mut(), src.data()) {
        (PropertyData::Dictionary(d), PropertyData::Dictionary(s)) => merge_dictionary(d, s),
        (PropertyData::List(d), PropertyData::List(s)) => merge_list(d, s),
        (PropertyData::Value(d), PropertyData::Value(s)) => {
            // Value equality looks at the payload only.
            if d != s || d.declared_length() != s.declared_length() {
                *d = s.clone();
            }
        }
        (PropertyData::Reference(d), PropertyData::Reference(s)) => *d = *s,
        (PropertyData::String(d), PropertyData::String(s)) => *d = *s,
        (PropertyData::Null, PropertyData::Null) => {}
        _ => return false,
    }
    true
}

/// Merge `src` into `dest` so that `dest` ends up equal to `src`.
pub fn merge_list(dest: &mut List, src: &List) {
    let mut i = 0;
    loop {
        let (Some(d), Some(s)) = (dest.get(i), src.get(i)) else {
            break;
        };
        if structurally_equal(d, s) {
            i += 1;
            continue;
        }

        if dest.len() != src.len() {
            // The destination element was removed.
            if dest.get(i + 1).is_some_and(|next| structurally_equal(s, next)) {
                dest.remove(i);
                continue;
            }
            // The source element was inserted.
            if src.get(i + 1).is_some_and(|next| structurally_equal(d, next)) {
                dest.insert(i, s.clone());
                i += 2;
                continue;
            }
        }

        if let Some(slot) = dest.get_mut(i) {
            if !copy(slot, s) {
                *slot = s.clone();
            }
        }
        i += 1;
    }

    dest.truncate(src.len());
    let tail: Vec<Property> = src.iter().skip(dest.len()).cloned().collect();
    let at = dest.len();
    dest.add_range(at, tail);
}

/// Merge `src` into `dest`: drop keys `src` lacks, merge or assign the rest.
pub fn merge_dictionary(dest: &mut Dictionary, src: &Dictionary) {
    dest.retain(|name, _| src.contains(name));
    for (name, s) in src.iter() {
        match dest.get_mut(name) {
            Some(d) => {
                if !copy(d, s) {
                    *d = s.clone();
                }
            }
            None => {
                dest.insert(name.clone(), s.clone());
            }
        }
    }
}

/// Deep structural equality, ignoring node identity.
pub fn structurally_equal(a: &Property, b: &Property) -> bool {
    match (a.data(), b.data()) {
        (PropertyData::Dictionary(x), PropertyData::Dictionary(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(name, v)| y.get(name).is_some_and(|w| structurally_equal(v, w)))
        }
        (PropertyData::List(x), PropertyData::List(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(v, w)| structurally_equal(v, w))
        }
        (PropertyData::Value(x), PropertyData::Value(y)) => x == y,
        (PropertyData::Reference(x), PropertyData::Reference(y)) => x == y,
        (PropertyData::String(x), PropertyData::String(y)) => x == y,
        (PropertyData::Null, PropertyData::Null) => true,
        _ => false,
    }
}
