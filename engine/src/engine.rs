//! The sync engine: every reconciliation service behind one owner.
//!
//! The engine holds no session and no world. Both are passed into each call,
//! so one process can run any number of independent engines.

use crate::{
    diff, error::Result, locks, ApplyReport, Checksum, Converter, EditAuthority, EntityId,
    EventDispatcher, FieldModification, FieldValue, GuidList, GuidManager, HostUndoState,
    IdentityMap, ListenerRegistry, LockTracker, ObjectId, ReplayContext, SendReport, Session,
    SessionEvent, SyncConfig, SyncContext, SyncMode, Translator, UndoLog, UndoOperation, World,
};

/// Result of [`SyncEngine::sync_entity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The entity has no syncing object.
    NotSynced,
    /// Nothing differed.
    Unchanged,
    /// Local changes were written to the object and announced.
    Sent(SendReport),
    /// Another user holds the lock; the entity was put back to the object's
    /// state.
    Reverted(ApplyReport),
}

#[derive(Debug)]
pub struct SyncEngine {
    config: SyncConfig,
    dispatcher: EventDispatcher,
    identity: IdentityMap,
    guids: GuidManager,
    undo: UndoLog,
    locks: LockTracker,
    checksum: Checksum,
    initialized: bool,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            dispatcher: EventDispatcher::new(),
            identity: IdentityMap::new(),
            guids: GuidManager::new(),
            undo: UndoLog::with_max_depth(config.max_undo_depth),
            locks: LockTracker::new(),
            checksum: Checksum::excluding(config.checksum_exclude.iter().cloned()),
            initialized: false,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn identity(&self) -> &IdentityMap {
        &self.identity
    }

    pub fn guids(&self) -> &GuidManager {
        &self.guids
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    pub fn locks(&self) -> &LockTracker {
        &self.locks
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn listeners_mut(&mut self) -> &mut ListenerRegistry {
        self.dispatcher.listeners_mut()
    }

    /// Borrow the dispatcher and a context over the other services at once.
    fn split<'a>(
        &'a mut self,
        session: &'a mut dyn Session,
        world: &'a mut dyn World,
    ) -> (&'a mut EventDispatcher, SyncContext<'a>) {
        let Self {
            config,
            dispatcher,
            identity,
            guids,
            ..
        } = self;
        let ctx = SyncContext {
            session,
            world,
            identity,
            guids,
            config,
        };
        (dispatcher, ctx)
    }

    // Lifecycle

    pub fn register(&mut self, translator: impl Translator + 'static) -> Result<()> {
        self.dispatcher.register(Box::new(translator))
    }

    pub fn start(&mut self) {
        self.dispatcher.start();
    }

    pub fn stop(&mut self) {
        self.dispatcher.stop();
    }

    pub fn is_active(&self) -> bool {
        self.dispatcher.is_active()
    }

    /// Start syncing with a session.
    pub fn connect(&mut self, session: &mut dyn Session, world: &mut dyn World) {
        if !self.initialized {
            self.dispatcher.initialize();
            self.initialized = true;
        }
        self.dispatcher.start();
        let (dispatcher, mut ctx) = self.split(session, world);
        dispatcher.session_connected(&mut ctx);
    }

    /// Stop syncing and forget every object association.
    pub fn disconnect(&mut self, session: &mut dyn Session, world: &mut dyn World) {
        let (dispatcher, mut ctx) = self.split(session, world);
        dispatcher.session_disconnected(&mut ctx);
        self.dispatcher.stop();
        self.identity.clear();
        self.locks.clear();
        tracing::info!("session disconnected");
    }

    // Objects

    /// Replicate a local entity, along with any live entities it references.
    /// Returns its existing object if it already has one.
    pub fn create(
        &mut self,
        entity: EntityId,
        session: &mut dyn Session,
        world: &mut dyn World,
    ) -> Option<ObjectId> {
        if let Some(object) = self.identity.object_of(entity) {
            return Some(object);
        }
        let (dispatcher, mut ctx) = self.split(session, world);
        let object = dispatcher.create(entity, &mut ctx)?;
        ctx.guids
            .get_or_create_id(entity, ctx.config.deterministic_ids, &*ctx.world);
        if self.create_referenced(entity, session, world) {
            self.sync_entity(entity, session, world);
        }
        Some(object)
    }

    /// Replicate the live, unsynced entities that `entity` references so its
    /// references can be written. Returns whether any object was created.
    fn create_referenced(
        &mut self,
        entity: EntityId,
        session: &mut dyn Session,
        world: &mut dyn World,
    ) -> bool {
        let Some(source) = world.entity(entity) else {
            return false;
        };
        let mut targets = Vec::new();
        for name in source.list_fields() {
            if let Some(value) = source.get_field(&name) {
                collect_references(&value, &mut targets);
            }
        }

        let mut created = false;
        for target in targets {
            if self.identity.contains_entity(target) || !world.is_alive(target) {
                continue;
            }
            if self.create(target, session, world).is_some() {
                tracing::debug!(entity, target, "replicated referenced entity");
                created = true;
            }
        }
        created
    }

    /// Delete the object replicating a local entity.
    pub fn delete(&mut self, entity: EntityId, session: &mut dyn Session) -> bool {
        let Some(object) = self.identity.remove_entity(entity) else {
            return false;
        };
        self.locks.forget(object);
        session.delete_object(object)
    }

    /// Deliver one session event.
    pub fn handle_event(
        &mut self,
        event: &SessionEvent,
        session: &mut dyn Session,
        world: &mut dyn World,
    ) -> bool {
        let (dispatcher, mut ctx) = self.split(session, world);
        dispatcher.dispatch(event, &mut ctx)
    }

    /// Deliver every queued session event. Returns how many were handled.
    pub fn pump(&mut self, session: &mut dyn Session, world: &mut dyn World) -> usize {
        let mut handled = 0;
        while let Some(event) = session.poll_event() {
            if self.handle_event(&event, session, world) {
                handled += 1;
            }
        }
        handled
    }

    /// Reconcile one entity with its object: send local edits, or revert them
    /// when another user holds the lock.
    pub fn sync_entity(
        &mut self,
        entity: EntityId,
        session: &mut dyn Session,
        world: &mut dyn World,
    ) -> SyncOutcome {
        let Some(object) = self.identity.object_of(entity) else {
            return SyncOutcome::NotSynced;
        };
        let Some(replicated) = session.object(object).filter(|o| o.is_syncing()) else {
            return SyncOutcome::NotSynced;
        };
        if locks::authority(replicated.lock_state(), &self.config.local_user)
            == EditAuthority::Revert
        {
            return self.revert(entity, object, session, world);
        }

        self.create_referenced(entity, session, world);
        let Some(source) = world.entity(entity) else {
            return SyncOutcome::NotSynced;
        };
        let Some((replicated, strings)) = session.object_with_strings_mut(object) else {
            return SyncOutcome::NotSynced;
        };
        let Some(dict) = replicated.root_mut().as_dictionary_mut() else {
            return SyncOutcome::NotSynced;
        };
        let converter = Converter::with_world(&self.identity, &*world);
        let report = diff::send_property_changes(source, dict, &converter, strings);
        if report.is_empty() {
            return SyncOutcome::Unchanged;
        }
        session.send_changes(object);
        SyncOutcome::Sent(report)
    }

    /// Put a locked entity back to its object's state.
    fn revert(
        &mut self,
        entity: EntityId,
        object: ObjectId,
        session: &mut dyn Session,
        world: &mut dyn World,
    ) -> SyncOutcome {
        let Some(dict) = session.object(object).and_then(|o| o.root().as_dictionary()) else {
            return SyncOutcome::NotSynced;
        };
        let Some(target) = world.entity_mut(entity) else {
            return SyncOutcome::NotSynced;
        };
        let converter = Converter::new(&self.identity);
        let report = diff::apply_properties(target, dict, &converter, session.strings());
        world.set_lock_marker(entity, true);
        if report.is_empty() {
            return SyncOutcome::Unchanged;
        }
        tracing::debug!(entity, object, fields = ?report.changed, "reverted edit on locked entity");
        SyncOutcome::Reverted(report)
    }

    // Locks

    /// The host selected `entity`.
    pub fn select(&mut self, entity: EntityId, session: &mut dyn Session) -> bool {
        if !self.config.lock_on_select {
            return false;
        }
        self.locks.select(entity, &self.identity, session)
    }

    /// The host deselected `entity`.
    pub fn deselect(&mut self, entity: EntityId, session: &mut dyn Session) -> bool {
        self.locks.deselect(entity, &self.identity, session)
    }

    // Undo

    pub fn observe_host_undo(&mut self, state: HostUndoState) {
        self.undo.observe_host(state);
    }

    pub fn record_undo(&mut self, op: Box<dyn UndoOperation>) -> bool {
        self.undo.record(op, SyncMode::Live)
    }

    pub fn record_modifications(&mut self, mods: Vec<FieldModification>) -> bool {
        self.undo.record_modifications(mods, SyncMode::Live)
    }

    /// Undo the last transaction, then resync the entities it touched and
    /// restore their lock markers.
    pub fn undo(&mut self, session: &mut dyn Session, world: &mut dyn World) -> Vec<EntityId> {
        let touched = {
            let mut ctx = ReplayContext {
                world: &mut *world,
                session: &mut *session,
                mode: SyncMode::Live,
            };
            self.undo.undo(&mut ctx)
        };
        self.after_replay(&touched, session, world);
        touched
    }

    /// Redo the last undone transaction.
    pub fn redo(&mut self, session: &mut dyn Session, world: &mut dyn World) -> Vec<EntityId> {
        let touched = {
            let mut ctx = ReplayContext {
                world: &mut *world,
                session: &mut *session,
                mode: SyncMode::Live,
            };
            self.undo.redo(&mut ctx)
        };
        self.after_replay(&touched, session, world);
        touched
    }

    fn after_replay(
        &mut self,
        touched: &[EntityId],
        session: &mut dyn Session,
        world: &mut dyn World,
    ) {
        for &entity in touched {
            let Some(object) = self.identity.object_of(entity) else {
                continue;
            };
            let locked = session
                .object(object)
                .is_some_and(|o| o.is_locked_by_other(&self.config.local_user));
            world.set_lock_marker(entity, locked);
            self.sync_entity(entity, session, world);
        }
    }

    // Checksums

    pub fn checksum_object(&self, object: ObjectId, session: &dyn Session) -> Option<u64> {
        let replicated = session.object(object)?;
        Some(self.checksum.object(replicated, session.strings()))
    }

    pub fn checksum_session(&self, session: &dyn Session) -> u64 {
        self.checksum.session(session)
    }

    // Stable ids

    pub fn save_ids(&self, scope: &str, world: &dyn World) -> GuidList {
        self.guids.save(scope, world)
    }

    pub fn load_ids(&mut self, list: &GuidList, world: &dyn World) -> Result<Vec<EntityId>> {
        self.guids.load(list, world)
    }
}

fn collect_references(value: &FieldValue, out: &mut Vec<EntityId>) {
    match value {
        FieldValue::Entity(Some(entity)) => out.push(*entity),
        FieldValue::List(items) => items.iter().for_each(|item| collect_references(item, out)),
        FieldValue::Struct(fields) => {
            fields.values().for_each(|field| collect_references(field, out))
        }
        _ => {}
    }
}
