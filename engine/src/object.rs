//! Replicated objects.
//!
//! A [`ReplicatedObject`] is the session-side counterpart of one native entity:
//! a type tag, a root property and a place in the object tree. Lock state is
//! owned by the session and mirrored here.

use crate::{ObjectId, Property, PropertyPath, TypeTag, UserId};
use serde::{Deserialize, Serialize};

/// Creation flags passed to the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectFlags(u32);

impl ObjectFlags {
    pub const NONE: ObjectFlags = ObjectFlags(0);
    /// Object is deleted when its creator leaves the session.
    pub const TRANSIENT: ObjectFlags = ObjectFlags(1);
    /// Object survives the deletion of its parent.
    pub const ORPHANABLE: ObjectFlags = ObjectFlags(1 << 1);

    pub fn contains(self, other: ObjectFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for ObjectFlags {
    type Output = ObjectFlags;

    fn bitor(self, rhs: ObjectFlags) -> ObjectFlags {
        ObjectFlags(self.0 | rhs.0)
    }
}

/// Per-object lock state.
///
/// `Unlocked -> Requested -> Locked(owner) -> Unlocked`. A denied request
/// drops straight back to `Unlocked`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "owner", rename_all = "camelCase")]
pub enum LockState {
    #[default]
    Unlocked,
    Requested,
    Locked(UserId),
}

/// An object in the replicated session.
#[derive(Debug, Clone)]
pub struct ReplicatedObject {
    id: ObjectId,
    type_tag: TypeTag,
    root: Property,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    flags: ObjectFlags,
    lock: LockState,
    syncing: bool,
}

impl ReplicatedObject {
    pub fn new(
        id: ObjectId,
        type_tag: impl Into<TypeTag>,
        root: Property,
        flags: ObjectFlags,
    ) -> Self {
        Self {
            id,
            type_tag: type_tag.into(),
            root,
            parent: None,
            children: Vec::new(),
            flags,
            lock: LockState::Unlocked,
            syncing: true,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn root(&self) -> &Property {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Property {
        &mut self.root
    }

    /// Resolve a property inside this object.
    pub fn property(&self, path: &PropertyPath) -> Option<&Property> {
        self.root.at(path)
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    pub fn flags(&self) -> ObjectFlags {
        self.flags
    }

    pub fn lock_state(&self) -> &LockState {
        &self.lock
    }

    pub fn lock_owner(&self) -> Option<&str> {
        match &self.lock {
            LockState::Locked(owner) => Some(owner),
            _ => None,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.lock, LockState::Locked(_))
    }

    /// Locked by anyone other than `user`.
    pub fn is_locked_by_other(&self, user: &str) -> bool {
        self.lock_owner().is_some_and(|owner| owner != user)
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    pub fn set_lock_state(&mut self, lock: LockState) {
        self.lock = lock;
    }

    pub fn set_syncing(&mut self, syncing: bool) {
        self.syncing = syncing;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ObjectId>) {
        self.parent = parent;
    }

    /// Insert a child id, returning the index it landed at.
    pub(crate) fn add_child(&mut self, child: ObjectId, index: Option<usize>) -> usize {
        let index = index.unwrap_or(self.children.len()).min(self.children.len());
        self.children.insert(index, child);
        index
    }

    pub(crate) fn remove_child(&mut self, child: ObjectId) -> Option<usize> {
        let index = self.children.iter().position(|c| *c == child)?;
        self.children.remove(index);
        Some(index)
    }
}
