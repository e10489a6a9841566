//! Session interface and an in-memory session.
//!
//! The [`Session`] trait is everything the reconciliation core needs from the
//! transport layer: object graph queries, the shared string table, mutation
//! requests and a queue of incoming events. [`MemorySession`] implements it
//! without any IO so the core can be driven end to end in tests and tools.

use crate::{
    LockState, ObjectFlags, ObjectId, Property, PropertyPath, ReplicatedObject, SessionEvent,
    StringTable, TypeTag, UserId,
};
use std::collections::{HashMap, VecDeque};

/// The external session collaborator.
pub trait Session {
    /// Get an object by id.
    fn object(&self, id: ObjectId) -> Option<&ReplicatedObject>;

    fn object_mut(&mut self, id: ObjectId) -> Option<&mut ReplicatedObject>;

    /// An object together with the string table, for edits that intern strings.
    fn object_with_strings_mut(
        &mut self,
        id: ObjectId,
    ) -> Option<(&mut ReplicatedObject, &mut StringTable)>;

    /// Ids of objects without a parent, in creation order.
    fn root_objects(&self) -> Vec<ObjectId>;

    fn strings(&self) -> &StringTable;

    fn strings_mut(&mut self) -> &mut StringTable;

    /// Request creation of a new object.
    fn create_object(
        &mut self,
        type_tag: &str,
        root: Property,
        flags: ObjectFlags,
        parent: Option<ObjectId>,
    ) -> ObjectId;

    /// Request deletion of an object and its descendants.
    fn delete_object(&mut self, id: ObjectId) -> bool;

    /// Announce that an object's property tree was changed locally.
    fn send_changes(&mut self, id: ObjectId);

    /// Request the lock on an object. Returns false if the object is not
    /// currently syncing.
    fn request_lock(&mut self, id: ObjectId) -> bool;

    /// Release a held or requested lock. Returns false if the object is not
    /// currently syncing.
    fn release_lock(&mut self, id: ObjectId) -> bool;

    /// Take the next incoming event.
    fn poll_event(&mut self) -> Option<SessionEvent>;
}

/// A request sent from this replica to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Create { object: ObjectId, type_tag: TypeTag },
    Delete { object: ObjectId, type_tag: TypeTag },
    Update { object: ObjectId },
    Lock { object: ObjectId },
    Unlock { object: ObjectId },
}

/// A session held entirely in memory.
///
/// Local requests land in an outbox; `acknowledge` turns pending creates and
/// deletes into confirmation events. The `remote_*` methods play the part of
/// other peers and queue the events they would cause.
#[derive(Debug, Default)]
pub struct MemorySession {
    objects: HashMap<ObjectId, ReplicatedObject>,
    roots: Vec<ObjectId>,
    strings: StringTable,
    next_id: ObjectId,
    outbox: Vec<Request>,
    inbox: VecDeque<SessionEvent>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Number of objects in the session.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Requests sent since the last drain.
    pub fn outbox(&self) -> &[Request] {
        &self.outbox
    }

    pub fn drain_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.outbox)
    }

    /// Number of events waiting to be polled.
    pub fn pending_events(&self) -> usize {
        self.inbox.len()
    }

    /// Confirm all outstanding creates and deletes.
    pub fn acknowledge(&mut self) {
        for request in &self.outbox {
            match request {
                Request::Create { object, .. } => {
                    self.inbox.push_back(SessionEvent::ConfirmCreate { object: *object });
                }
                Request::Delete { object, type_tag } => {
                    self.inbox.push_back(SessionEvent::ConfirmDelete {
                        object: *object,
                        type_tag: type_tag.clone(),
                    });
                }
                _ => {}
            }
        }
        self.outbox
            .retain(|r| !matches!(r, Request::Create { .. } | Request::Delete { .. }));
    }

    fn insert_object(
        &mut self,
        type_tag: &str,
        root: Property,
        flags: ObjectFlags,
        parent: Option<ObjectId>,
    ) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;

        let mut object = ReplicatedObject::new(id, type_tag, root, flags);
        match parent.and_then(|p| self.objects.get_mut(&p)) {
            Some(parent_obj) => {
                parent_obj.add_child(id, None);
                object.set_parent(parent);
            }
            None => self.roots.push(id),
        }
        self.objects.insert(id, object);
        id
    }

    /// Remove an object and its descendants, returning `(id, type_tag)` for
    /// each removed object, parents first.
    fn remove_subtree(&mut self, id: ObjectId) -> Vec<(ObjectId, TypeTag)> {
        let mut removed = Vec::new();
        let Some(object) = self.objects.get(&id) else {
            return removed;
        };
        match object.parent().and_then(|p| self.objects.get_mut(&p)) {
            Some(parent) => {
                parent.remove_child(id);
            }
            None => self.roots.retain(|r| *r != id),
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(object) = self.objects.remove(&current) {
                stack.extend(object.children().iter().rev());
                removed.push((current, object.type_tag().to_string()));
            }
        }
        removed
    }

    // Remote peer actions

    /// Another peer creates an object.
    pub fn remote_create(
        &mut self,
        type_tag: &str,
        root: Property,
        parent: Option<ObjectId>,
    ) -> ObjectId {
        let id = self.insert_object(type_tag, root, ObjectFlags::NONE, parent);
        self.inbox.push_back(SessionEvent::Create { object: id });
        id
    }

    /// Another peer deletes an object and its descendants.
    pub fn remote_delete(&mut self, id: ObjectId) -> bool {
        let removed = self.remove_subtree(id);
        for (object, type_tag) in &removed {
            self.inbox.push_back(SessionEvent::Delete {
                object: *object,
                type_tag: type_tag.clone(),
            });
        }
        !removed.is_empty()
    }

    /// Another peer sets a property, creating dictionary entries as needed.
    pub fn remote_set(&mut self, id: ObjectId, path: &PropertyPath, property: Property) -> bool {
        let Some(object) = self.objects.get_mut(&id) else {
            return false;
        };
        let stored = match path.name() {
            Some(name) => object
                .root_mut()
                .at_mut(&path.parent())
                .and_then(|p| p.as_dictionary_mut())
                .map(|d| {
                    d.insert(name, property);
                })
                .is_some(),
            None => match path.position() {
                Some(index) => object
                    .root_mut()
                    .at_mut(&path.parent())
                    .and_then(|p| p.as_list_mut())
                    .and_then(|l| l.set(index, property))
                    .is_some(),
                None => {
                    *object.root_mut() = property;
                    true
                }
            },
        };
        if stored {
            self.inbox.push_back(SessionEvent::PropertyChange {
                object: id,
                path: path.clone(),
            });
        }
        stored
    }

    /// Another peer removes a dictionary field.
    pub fn remote_remove_field(&mut self, id: ObjectId, path: &PropertyPath) -> bool {
        let Some(name) = path.name() else {
            return false;
        };
        let removed = self
            .objects
            .get_mut(&id)
            .and_then(|o| o.root_mut().at_mut(&path.parent()))
            .and_then(|p| p.as_dictionary_mut())
            .and_then(|d| d.remove(name))
            .is_some();
        if removed {
            self.inbox.push_back(SessionEvent::FieldRemoved {
                object: id,
                path: path.clone(),
            });
        }
        removed
    }

    /// Another peer inserts elements into a list.
    pub fn remote_list_add(
        &mut self,
        id: ObjectId,
        path: &PropertyPath,
        index: usize,
        items: Vec<Property>,
    ) -> bool {
        let count = items.len();
        let Some(list) = self
            .objects
            .get_mut(&id)
            .and_then(|o| o.root_mut().at_mut(path))
            .and_then(|p| p.as_list_mut())
        else {
            return false;
        };
        let index = index.min(list.len());
        list.add_range(index, items);
        self.inbox.push_back(SessionEvent::ListAdd {
            object: id,
            path: path.clone(),
            index,
            count,
        });
        true
    }

    /// Another peer removes elements from a list.
    pub fn remote_list_remove(
        &mut self,
        id: ObjectId,
        path: &PropertyPath,
        index: usize,
        count: usize,
    ) -> bool {
        let Some(list) = self
            .objects
            .get_mut(&id)
            .and_then(|o| o.root_mut().at_mut(path))
            .and_then(|p| p.as_list_mut())
        else {
            return false;
        };
        let removed = list.remove_range(index, count).len();
        if removed > 0 {
            self.inbox.push_back(SessionEvent::ListRemove {
                object: id,
                path: path.clone(),
                index,
                count: removed,
            });
        }
        removed > 0
    }

    /// Another peer moves an object under a new parent.
    pub fn remote_reparent(
        &mut self,
        id: ObjectId,
        parent: Option<ObjectId>,
        index: Option<usize>,
    ) -> bool {
        let Some(old_parent) = self.objects.get(&id).map(|o| o.parent()) else {
            return false;
        };
        if parent.is_some_and(|p| !self.objects.contains_key(&p)) {
            return false;
        }
        match old_parent.and_then(|p| self.objects.get_mut(&p)) {
            Some(old) => {
                old.remove_child(id);
            }
            None => self.roots.retain(|r| *r != id),
        }
        let child_index = match parent.and_then(|p| self.objects.get_mut(&p)) {
            Some(new_parent) => Some(new_parent.add_child(id, index)),
            None => {
                self.roots.push(id);
                None
            }
        };
        if let Some(object) = self.objects.get_mut(&id) {
            object.set_parent(parent);
        }
        self.inbox.push_back(SessionEvent::ParentChange {
            object: id,
            child_index,
        });
        true
    }

    /// The session grants the lock on `id` to `owner`.
    pub fn grant_lock(&mut self, id: ObjectId, owner: impl Into<UserId>) -> bool {
        let Some(object) = self.objects.get_mut(&id) else {
            return false;
        };
        let was_locked = object.is_locked();
        object.set_lock_state(LockState::Locked(owner.into()));
        let event = if was_locked {
            SessionEvent::LockOwnerChange { object: id }
        } else {
            SessionEvent::Lock { object: id }
        };
        self.inbox.push_back(event);
        self.inbox.push_back(SessionEvent::DirectLockChange { object: id });
        true
    }

    /// The session denies a pending lock request.
    pub fn deny_lock(&mut self, id: ObjectId) -> bool {
        match self.objects.get_mut(&id) {
            Some(object) if *object.lock_state() == LockState::Requested => {
                object.set_lock_state(LockState::Unlocked);
                true
            }
            _ => false,
        }
    }

    /// The current owner releases the lock.
    pub fn remote_unlock(&mut self, id: ObjectId) -> bool {
        let Some(object) = self.objects.get_mut(&id) else {
            return false;
        };
        if !object.is_locked() {
            return false;
        }
        object.set_lock_state(LockState::Unlocked);
        self.inbox.push_back(SessionEvent::Unlock { object: id });
        self.inbox.push_back(SessionEvent::DirectLockChange { object: id });
        true
    }

    /// Mark every object as no longer syncing, as on a dropped connection.
    pub fn disconnect(&mut self) {
        for object in self.objects.values_mut() {
            object.set_syncing(false);
        }
        self.inbox.clear();
    }
}

impl Session for MemorySession {
    fn object(&self, id: ObjectId) -> Option<&ReplicatedObject> {
        self.objects.get(&id)
    }

    fn object_mut(&mut self, id: ObjectId) -> Option<&mut ReplicatedObject> {
        self.objects.get_mut(&id)
    }

    fn object_with_strings_mut(
        &mut self,
        id: ObjectId,
    ) -> Option<(&mut ReplicatedObject, &mut StringTable)> {
        let object = self.objects.get_mut(&id)?;
        Some((object, &mut self.strings))
    }

    fn root_objects(&self) -> Vec<ObjectId> {
        self.roots.clone()
    }

    fn strings(&self) -> &StringTable {
        &self.strings
    }

    fn strings_mut(&mut self) -> &mut StringTable {
        &mut self.strings
    }

    fn create_object(
        &mut self,
        type_tag: &str,
        root: Property,
        flags: ObjectFlags,
        parent: Option<ObjectId>,
    ) -> ObjectId {
        let id = self.insert_object(type_tag, root, flags, parent);
        self.outbox.push(Request::Create {
            object: id,
            type_tag: type_tag.to_string(),
        });
        id
    }

    fn delete_object(&mut self, id: ObjectId) -> bool {
        let removed = self.remove_subtree(id);
        for (object, type_tag) in &removed {
            self.outbox.push(Request::Delete {
                object: *object,
                type_tag: type_tag.clone(),
            });
        }
        !removed.is_empty()
    }

    fn send_changes(&mut self, id: ObjectId) {
        if self.objects.contains_key(&id) {
            self.outbox.push(Request::Update { object: id });
        }
    }

    fn request_lock(&mut self, id: ObjectId) -> bool {
        let Some(object) = self.objects.get_mut(&id).filter(|o| o.is_syncing()) else {
            return false;
        };
        if *object.lock_state() == LockState::Unlocked {
            object.set_lock_state(LockState::Requested);
        }
        self.outbox.push(Request::Lock { object: id });
        true
    }

    fn release_lock(&mut self, id: ObjectId) -> bool {
        let Some(object) = self.objects.get_mut(&id).filter(|o| o.is_syncing()) else {
            return false;
        };
        if *object.lock_state() == LockState::Requested {
            object.set_lock_state(LockState::Unlocked);
        }
        self.outbox.push(Request::Unlock { object: id });
        true
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        self.inbox.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::ValueData;

    #[test]
    fn local_create_goes_to_outbox() {
        let mut session = MemorySession::new();
        let id = session.create_object("mesh", Property::dictionary(), ObjectFlags::NONE, None);

        assert_eq!(session.root_objects(), vec![id]);
        assert_eq!(
            session.outbox(),
            &[Request::Create {
                object: id,
                type_tag: "mesh".into()
            }]
        );
        assert!(session.poll_event().is_none());

        session.acknowledge();
        assert_eq!(
            session.poll_event(),
            Some(SessionEvent::ConfirmCreate { object: id })
        );
        assert!(session.outbox().is_empty());
    }

    #[test]
    fn delete_removes_subtree() {
        let mut session = MemorySession::new();
        let parent =
            session.create_object("group", Property::dictionary(), ObjectFlags::NONE, None);
        let child =
            session.create_object("mesh", Property::dictionary(), ObjectFlags::NONE, Some(parent));
        assert_eq!(session.object(parent).unwrap().children(), &[child]);
        assert_eq!(session.object(child).unwrap().parent(), Some(parent));

        assert!(session.remote_delete(parent));
        assert!(session.is_empty());
        assert_eq!(
            session.poll_event(),
            Some(SessionEvent::Delete {
                object: parent,
                type_tag: "group".into()
            })
        );
        assert_eq!(
            session.poll_event(),
            Some(SessionEvent::Delete {
                object: child,
                type_tag: "mesh".into()
            })
        );
    }

    #[test]
    fn remote_set_and_remove_field() {
        let mut session = MemorySession::new();
        let id = session.remote_create("light", Property::dictionary(), None);
        session.poll_event();

        let path = PropertyPath::field("intensity");
        assert!(session.remote_set(id, &path, Property::value(2.5f32)));
        let value = session.object(id).unwrap().property(&path).unwrap();
        assert_eq!(value.as_value().unwrap().data(), &ValueData::Float(2.5));
        assert!(matches!(
            session.poll_event(),
            Some(SessionEvent::PropertyChange { .. })
        ));

        assert!(session.remote_remove_field(id, &path));
        assert!(session.object(id).unwrap().property(&path).is_none());
        assert!(!session.remote_remove_field(id, &path));
    }

    #[test]
    fn lock_lifecycle() {
        let mut session = MemorySession::new();
        let id = session.create_object("mesh", Property::dictionary(), ObjectFlags::NONE, None);

        assert!(session.request_lock(id));
        assert_eq!(session.object(id).unwrap().lock_state(), &LockState::Requested);

        assert!(session.deny_lock(id));
        assert_eq!(session.object(id).unwrap().lock_state(), &LockState::Unlocked);

        session.grant_lock(id, "bob");
        assert_eq!(session.object(id).unwrap().lock_owner(), Some("bob"));
        assert_eq!(session.poll_event(), Some(SessionEvent::Lock { object: id }));

        session.grant_lock(id, "carol");
        session.poll_event();
        assert_eq!(
            session.poll_event(),
            Some(SessionEvent::LockOwnerChange { object: id })
        );

        assert!(session.remote_unlock(id));
        assert!(!session.object(id).unwrap().is_locked());
    }

    #[test]
    fn lock_requests_need_syncing_object() {
        let mut session = MemorySession::new();
        let id = session.create_object("mesh", Property::dictionary(), ObjectFlags::NONE, None);
        session.disconnect();
        assert!(!session.request_lock(id));
        assert!(!session.release_lock(id));
        assert!(!session.request_lock(999));
    }

    #[test]
    fn list_edits() {
        let mut session = MemorySession::new();
        let mut root = crate::Dictionary::new();
        root.insert("points", Property::list());
        let id = session.remote_create("path", Property::from(root), None);
        session.poll_event();

        let path = PropertyPath::field("points");
        assert!(session.remote_list_add(
            id,
            &path,
            0,
            vec![Property::value(1), Property::value(2)]
        ));
        assert_eq!(
            session.poll_event(),
            Some(SessionEvent::ListAdd {
                object: id,
                path: path.clone(),
                index: 0,
                count: 2
            })
        );

        assert!(session.remote_list_remove(id, &path, 1, 5));
        assert_eq!(
            session.poll_event(),
            Some(SessionEvent::ListRemove {
                object: id,
                path: path.clone(),
                index: 1,
                count: 1
            })
        );
        let list = session.object(id).unwrap().property(&path).unwrap().as_list().unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn reparent_reports_child_index() {
        let mut session = MemorySession::new();
        let a = session.remote_create("group", Property::dictionary(), None);
        let b = session.remote_create("mesh", Property::dictionary(), None);
        while session.poll_event().is_some() {}

        assert!(session.remote_reparent(b, Some(a), None));
        assert_eq!(session.root_objects(), vec![a]);
        assert_eq!(
            session.poll_event(),
            Some(SessionEvent::ParentChange {
                object: b,
                child_index: Some(0)
            })
        );
    }
}
