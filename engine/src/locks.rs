//! Selection-driven locking.
//!
//! Selecting an entity asks the session for the lock on its object;
//! deselecting releases it. Grants and denials arrive later as events. Edits
//! made while another user holds the lock are not prevented here, they are
//! reverted when the entity is next synced.

use crate::{EntityId, IdentityMap, LockState, ObjectId, Session};
use std::collections::HashSet;

/// How the local replica may treat an object's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAuthority {
    /// Nobody else holds the lock; local edits are sent.
    Free,
    /// Another user holds the lock; local edits are reverted.
    Revert,
}

/// Edit authority for an object in `state`. A pending request counts as
/// unlocked until the session grants it.
pub fn authority(state: &LockState, local_user: &str) -> EditAuthority {
    match state {
        LockState::Locked(owner) if owner != local_user => EditAuthority::Revert,
        _ => EditAuthority::Free,
    }
}

/// Objects the local user has asked to lock.
#[derive(Debug, Clone, Default)]
pub struct LockTracker {
    selected: HashSet<ObjectId>,
}

impl LockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the lock for `entity`'s object. Returns false when the entity
    /// is not replicated or the object is not syncing.
    pub fn select(
        &mut self,
        entity: EntityId,
        identity: &IdentityMap,
        session: &mut dyn Session,
    ) -> bool {
        let Some(object) = identity.object_of(entity) else {
            return false;
        };
        if !session.request_lock(object) {
            tracing::debug!(entity, object, "lock request skipped, object not syncing");
            return false;
        }
        tracing::debug!(entity, object, "lock requested");
        self.selected.insert(object);
        true
    }

    /// Release the lock for `entity`'s object.
    pub fn deselect(
        &mut self,
        entity: EntityId,
        identity: &IdentityMap,
        session: &mut dyn Session,
    ) -> bool {
        let Some(object) = identity.object_of(entity) else {
            return false;
        };
        self.selected.remove(&object);
        if !session.release_lock(object) {
            tracing::debug!(entity, object, "lock release skipped, object not syncing");
            return false;
        }
        tracing::debug!(entity, object, "lock released");
        true
    }

    /// Drop `object` without touching the session.
    pub fn forget(&mut self, object: ObjectId) -> bool {
        self.selected.remove(&object)
    }

    pub fn is_selected(&self, object: ObjectId) -> bool {
        self.selected.contains(&object)
    }

    pub fn selected(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.selected.iter().copied()
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }
}
