//! Persisted stable-identifier lists.
//!
//! One list per scope holds `(id, entity)` pairs, kept sorted by entity so
//! the JSON form is deterministic.

use crate::{error::Result, EntityId, Error};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Version of the identifier list format.
pub const ID_LIST_FORMAT_VERSION: u32 = 1;

/// One persisted binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidEntry {
    /// The 16 id bytes, big-endian
    pub id: [u8; 16],
    pub entity: EntityId,
}

/// All stable identifiers of one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidList {
    /// List format version
    pub format_version: u32,
    /// Scope the entities belong to
    pub scope: String,
    /// Bindings ordered by entity
    pub entries: Vec<GuidEntry>,
}

impl GuidList {
    /// Create an empty list for `scope`.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            format_version: ID_LIST_FORMAT_VERSION,
            scope: scope.into(),
            entries: Vec::new(),
        }
    }

    /// Add a binding, keeping entries ordered by entity.
    pub fn push(&mut self, id: [u8; 16], entity: EntityId) {
        let at = self.entries.partition_point(|e| e.entity < entity);
        self.entries.insert(at, GuidEntry { id, entity });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that no entity appears twice. Shared ids are allowed; loading
    /// resolves them like any other collision.
    pub fn validate(&self) -> Result<()> {
        let mut entities = HashSet::new();
        for entry in &self.entries {
            if !entities.insert(entry.entity) {
                return Err(Error::InvalidIdList(format!(
                    "entity {} listed twice",
                    entry.entity
                )));
            }
        }
        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidIdList(e.to_string()))
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidIdList(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let list: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidIdList(e.to_string()))?;

        if list.format_version > ID_LIST_FORMAT_VERSION {
            return Err(Error::InvalidIdList(format!(
                "unsupported format version: {} (max supported: {})",
                list.format_version, ID_LIST_FORMAT_VERSION
            )));
        }

        Ok(list)
    }
}
