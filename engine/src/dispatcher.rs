//! Routes session events to translators.
//!
//! Each type tag has at most one translator. Events for a type with no
//! translator are logged and dropped. While stopped, the dispatcher drops
//! every event and declines to create objects.

use crate::{
    error::Result, EntityId, Error, ListenerRegistry, ObjectId, SessionEvent, SyncContext,
    Translator,
};
use std::collections::HashMap;

#[derive(Default)]
pub struct EventDispatcher {
    /// Translators in registration order
    translators: Vec<Box<dyn Translator>>,
    by_type: HashMap<String, usize>,
    listeners: ListenerRegistry,
    active: bool,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types: Vec<_> = self.translators.iter().map(|t| t.type_tag()).collect();
        f.debug_struct("EventDispatcher")
            .field("translators", &types)
            .field("listeners", &self.listeners)
            .field("active", &self.active)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a translator for its type tag.
    ///
    /// A second translator for the same type is rejected and the first stays
    /// in place.
    pub fn register(&mut self, translator: Box<dyn Translator>) -> Result<()> {
        let type_tag = translator.type_tag().to_string();
        if self.by_type.contains_key(&type_tag) {
            tracing::warn!(type_tag = %type_tag, "translator already registered, ignoring");
            return Err(Error::DuplicateTranslator(type_tag));
        }
        self.by_type.insert(type_tag, self.translators.len());
        self.translators.push(translator);
        Ok(())
    }

    pub fn has_translator(&self, type_tag: &str) -> bool {
        self.by_type.contains_key(type_tag)
    }

    pub fn translator_count(&self) -> usize {
        self.translators.len()
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut ListenerRegistry {
        &mut self.listeners
    }

    pub fn start(&mut self) {
        if !self.active {
            self.active = true;
            tracing::info!(translators = self.translators.len(), "dispatcher started");
        }
    }

    pub fn stop(&mut self) {
        if self.active {
            self.active = false;
            tracing::info!("dispatcher stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Run `initialize` on every translator.
    pub fn initialize(&mut self) {
        for translator in &mut self.translators {
            translator.initialize();
        }
    }

    pub fn session_connected(&mut self, ctx: &mut SyncContext<'_>) {
        for translator in &mut self.translators {
            translator.on_session_connect(ctx);
        }
    }

    pub fn session_disconnected(&mut self, ctx: &mut SyncContext<'_>) {
        for translator in &mut self.translators {
            translator.on_session_disconnect(ctx);
        }
    }

    /// Offer `entity` to each translator in registration order. The first
    /// one that accepts creates the object.
    pub fn create(&mut self, entity: EntityId, ctx: &mut SyncContext<'_>) -> Option<ObjectId> {
        if !self.active {
            tracing::debug!(entity, "dispatcher inactive, not creating");
            return None;
        }
        self.translators
            .iter_mut()
            .find_map(|translator| translator.try_create(entity, ctx))
    }

    /// Deliver one event. Returns false if it was dropped.
    pub fn dispatch(&mut self, event: &SessionEvent, ctx: &mut SyncContext<'_>) -> bool {
        if !self.active {
            return false;
        }
        let object = event.object();
        let type_tag = match event.carried_type() {
            Some(t) => t.to_string(),
            None => match ctx.session.object(object) {
                Some(o) => o.type_tag().to_string(),
                None => {
                    tracing::debug!(object, "event for unknown object dropped");
                    return false;
                }
            },
        };
        let Some(&index) = self.by_type.get(&type_tag) else {
            tracing::warn!(object, type_tag = %type_tag, "no translator for type, event dropped");
            return false;
        };

        route(self.translators[index].as_mut(), event, ctx);
        self.listeners.notify(event.key(), &type_tag, event);
        true
    }
}

fn route(translator: &mut dyn Translator, event: &SessionEvent, ctx: &mut SyncContext<'_>) {
    match event {
        SessionEvent::Create { object } => translator.on_create(*object, ctx),
        SessionEvent::ConfirmCreate { object } => translator.on_confirm_create(*object, ctx),
        SessionEvent::Delete { object, .. } => translator.on_delete(*object, ctx),
        SessionEvent::ConfirmDelete { object, .. } => translator.on_confirm_delete(*object, ctx),
        SessionEvent::Lock { object } => translator.on_lock(*object, ctx),
        SessionEvent::Unlock { object } => translator.on_unlock(*object, ctx),
        SessionEvent::LockOwnerChange { object } => translator.on_lock_owner_change(*object, ctx),
        SessionEvent::DirectLockChange { object } => {
            translator.on_direct_lock_change(*object, ctx)
        }
        SessionEvent::ParentChange {
            object,
            child_index,
        } => translator.on_parent_change(*object, *child_index, ctx),
        SessionEvent::PropertyChange { object, path } => {
            translator.on_property_change(*object, path, ctx)
        }
        SessionEvent::FieldRemoved { object, path } => {
            translator.on_field_removed(*object, path, ctx)
        }
        SessionEvent::ListAdd {
            object,
            path,
            index,
            count,
        } => translator.on_list_add(*object, path, *index, *count, ctx),
        SessionEvent::ListRemove {
            object,
            path,
            index,
            count,
        } => translator.on_list_remove(*object, path, *index, *count, ctx),
    }
}
