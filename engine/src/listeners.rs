//! Event listeners keyed by event kind and object type.
//!
//! A listener registered for a base type also hears events for every type
//! derived from it. Derived-type listeners run before base-type listeners;
//! within one type they run in registration order.

use crate::{EventKey, SessionEvent, TypeTag};
use std::collections::{HashMap, HashSet};

/// Handle returned by [`ListenerRegistry::add`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(u64);

pub type Listener = Box<dyn FnMut(&SessionEvent)>;

/// Parent links between object types.
#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
    parents: HashMap<TypeTag, TypeTag>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_parent(&mut self, child: impl Into<TypeTag>, parent: impl Into<TypeTag>) {
        self.parents.insert(child.into(), parent.into());
    }

    pub fn parent_of(&self, type_tag: &str) -> Option<&str> {
        self.parents.get(type_tag).map(String::as_str)
    }

    /// `type_tag` followed by its ancestors, nearest first. Stops at the
    /// first repeated type.
    pub fn resolve(&self, type_tag: &str) -> Vec<TypeTag> {
        let mut chain = vec![type_tag.to_string()];
        let mut seen: HashSet<&str> = HashSet::from([type_tag]);
        let mut current = type_tag;
        while let Some(parent) = self.parent_of(current) {
            if !seen.insert(parent) {
                tracing::warn!(type_tag, parent, "cycle in type hierarchy");
                break;
            }
            chain.push(parent.to_string());
            current = parent;
        }
        chain
    }
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: HashMap<(EventKey, TypeTag), Vec<(ListenerHandle, Listener)>>,
    types: TypeHierarchy,
    next_handle: u64,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .field("types", &self.types)
            .finish()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(&self) -> &TypeHierarchy {
        &self.types
    }

    pub fn set_parent_type(&mut self, child: impl Into<TypeTag>, parent: impl Into<TypeTag>) {
        self.types.set_parent(child, parent);
    }

    /// Register `listener` for events of kind `key` on objects of
    /// `type_tag` or any type derived from it.
    pub fn add(
        &mut self,
        key: EventKey,
        type_tag: impl Into<TypeTag>,
        listener: impl FnMut(&SessionEvent) + 'static,
    ) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle);
        self.next_handle += 1;
        self.listeners
            .entry((key, type_tag.into()))
            .or_default()
            .push((handle, Box::new(listener)));
        handle
    }

    /// Remove a listener. Returns false if the handle is unknown.
    pub fn remove(&mut self, handle: ListenerHandle) -> bool {
        for list in self.listeners.values_mut() {
            if let Some(pos) = list.iter().position(|(h, _)| *h == handle) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Invoke every listener matching `key` and `type_tag`. Returns how many
    /// ran.
    pub fn notify(&mut self, key: EventKey, type_tag: &str, event: &SessionEvent) -> usize {
        let mut count = 0;
        for resolved in self.types.resolve(type_tag) {
            if let Some(list) = self.listeners.get_mut(&(key, resolved)) {
                for (_, listener) in list.iter_mut() {
                    listener(event);
                    count += 1;
                }
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn create(object: u32) -> SessionEvent {
        SessionEvent::Create { object }
    }

    #[test]
    fn base_listeners_hear_derived_types() {
        let mut registry = ListenerRegistry::new();
        registry.set_parent_type("point_light", "light");
        registry.set_parent_type("light", "node");

        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["node", "light", "point_light"] {
            let log = Rc::clone(&log);
            registry.add(EventKey::Create, tag, move |_| log.borrow_mut().push(tag));
        }

        assert_eq!(registry.notify(EventKey::Create, "point_light", &create(1)), 3);
        assert_eq!(*log.borrow(), vec!["point_light", "light", "node"]);

        log.borrow_mut().clear();
        assert_eq!(registry.notify(EventKey::Create, "light", &create(1)), 2);
        assert_eq!(*log.borrow(), vec!["light", "node"]);
    }

    #[test]
    fn keys_are_independent() {
        let mut registry = ListenerRegistry::new();
        registry.add(EventKey::Delete, "light", |_| {});
        assert_eq!(registry.notify(EventKey::Create, "light", &create(1)), 0);
    }

    #[test]
    fn remove_by_handle() {
        let mut registry = ListenerRegistry::new();
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let handle = registry.add(EventKey::Create, "light", move |_| *counter.borrow_mut() += 1);
        registry.add(EventKey::Create, "light", |_| {});

        assert!(registry.remove(handle));
        assert!(!registry.remove(handle));
        assert_eq!(registry.notify(EventKey::Create, "light", &create(1)), 1);
        assert_eq!(*hits.borrow(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn hierarchy_cycle_terminates() {
        let mut types = TypeHierarchy::new();
        types.set_parent("a", "b");
        types.set_parent("b", "a");
        assert_eq!(types.resolve("a"), vec!["a", "b"]);
    }
}
