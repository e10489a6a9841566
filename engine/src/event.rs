//! Session events delivered to translators.

use crate::{ObjectId, PropertyPath, TypeTag};
use serde::{Deserialize, Serialize};

/// Kind of a [`SessionEvent`], used as a listener key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKey {
    Create,
    ConfirmCreate,
    Delete,
    ConfirmDelete,
    Lock,
    Unlock,
    LockOwnerChange,
    DirectLockChange,
    ParentChange,
    PropertyChange,
    FieldRemoved,
    ListAdd,
    ListRemove,
}

/// A lifecycle or mutation event emitted by the session.
///
/// Delete events carry the type tag because the object is already gone from
/// the session when they are delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    Create {
        object: ObjectId,
    },
    ConfirmCreate {
        object: ObjectId,
    },
    Delete {
        object: ObjectId,
        type_tag: TypeTag,
    },
    ConfirmDelete {
        object: ObjectId,
        type_tag: TypeTag,
    },
    Lock {
        object: ObjectId,
    },
    Unlock {
        object: ObjectId,
    },
    LockOwnerChange {
        object: ObjectId,
    },
    /// The object's own lock flag changed, as opposed to an inherited lock.
    DirectLockChange {
        object: ObjectId,
    },
    ParentChange {
        object: ObjectId,
        child_index: Option<usize>,
    },
    PropertyChange {
        object: ObjectId,
        path: PropertyPath,
    },
    /// A dictionary field was removed; the path names the removed field.
    FieldRemoved {
        object: ObjectId,
        path: PropertyPath,
    },
    ListAdd {
        object: ObjectId,
        path: PropertyPath,
        index: usize,
        count: usize,
    },
    ListRemove {
        object: ObjectId,
        path: PropertyPath,
        index: usize,
        count: usize,
    },
}

impl SessionEvent {
    /// The object this event is about.
    pub fn object(&self) -> ObjectId {
        match self {
            SessionEvent::Create { object }
            | SessionEvent::ConfirmCreate { object }
            | SessionEvent::Delete { object, .. }
            | SessionEvent::ConfirmDelete { object, .. }
            | SessionEvent::Lock { object }
            | SessionEvent::Unlock { object }
            | SessionEvent::LockOwnerChange { object }
            | SessionEvent::DirectLockChange { object }
            | SessionEvent::ParentChange { object, .. }
            | SessionEvent::PropertyChange { object, .. }
            | SessionEvent::FieldRemoved { object, .. }
            | SessionEvent::ListAdd { object, .. }
            | SessionEvent::ListRemove { object, .. } => *object,
        }
    }

    pub fn key(&self) -> EventKey {
        match self {
            SessionEvent::Create { .. } => EventKey::Create,
            SessionEvent::ConfirmCreate { .. } => EventKey::ConfirmCreate,
            SessionEvent::Delete { .. } => EventKey::Delete,
            SessionEvent::ConfirmDelete { .. } => EventKey::ConfirmDelete,
            SessionEvent::Lock { .. } => EventKey::Lock,
            SessionEvent::Unlock { .. } => EventKey::Unlock,
            SessionEvent::LockOwnerChange { .. } => EventKey::LockOwnerChange,
            SessionEvent::DirectLockChange { .. } => EventKey::DirectLockChange,
            SessionEvent::ParentChange { .. } => EventKey::ParentChange,
            SessionEvent::PropertyChange { .. } => EventKey::PropertyChange,
            SessionEvent::FieldRemoved { .. } => EventKey::FieldRemoved,
            SessionEvent::ListAdd { .. } => EventKey::ListAdd,
            SessionEvent::ListRemove { .. } => EventKey::ListRemove,
        }
    }

    /// Type tag carried by the event itself, if any.
    pub fn carried_type(&self) -> Option<&str> {
        match self {
            SessionEvent::Delete { type_tag, .. }
            | SessionEvent::ConfirmDelete { type_tag, .. } => {
                Some(type_tag)
            }
            _ => None,
        }
    }

    /// Property path the event refers to, if any.
    pub fn path(&self) -> Option<&PropertyPath> {
        match self {
            SessionEvent::PropertyChange { path, .. }
            | SessionEvent::FieldRemoved { path, .. }
            | SessionEvent::ListAdd { path, .. }
            | SessionEvent::ListRemove { path, .. } => Some(path),
            _ => None,
        }
    }
}
