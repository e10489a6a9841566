//! Undo and redo of replicated edits, kept in step with the host's undo stack.
//!
//! Edits are grouped into transactions. A transaction collects every field
//! modification and custom operation recorded while the host's undo group
//! stays the same; a new host group seals it onto the undo stack. When the
//! host clears its own history, both local stacks are cleared with it.
//!
//! Replay runs in [`SyncMode::Undoing`] or [`SyncMode::Redoing`]. Recording
//! in any mode other than [`SyncMode::Live`] does nothing, so operations that
//! fire while being replayed are not recorded a second time.

use crate::{EntityId, FieldValue, Session, World};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Whether edits come from the user or from undo replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncMode {
    #[default]
    Live,
    Undoing,
    Redoing,
}

/// The host's undo stack as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostUndoState {
    /// Current undo group counter
    pub group: u64,
    /// Entries on the host's undo stack
    pub undo_len: usize,
    /// Entries on the host's redo stack
    pub redo_len: usize,
}

/// One field changing from `before` to `after`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldModification {
    pub entity: EntityId,
    pub field: String,
    pub before: FieldValue,
    pub after: FieldValue,
}

impl FieldModification {
    pub fn new(
        entity: EntityId,
        field: impl Into<String>,
        before: FieldValue,
        after: FieldValue,
    ) -> Self {
        Self {
            entity,
            field: field.into(),
            before,
            after,
        }
    }
}

/// What undo replay may touch.
pub struct ReplayContext<'a> {
    pub world: &'a mut dyn World,
    pub session: &'a mut dyn Session,
    pub mode: SyncMode,
}

/// A custom undoable operation.
pub trait UndoOperation: fmt::Debug {
    /// Operations of the same kind may combine.
    fn kind(&self) -> &str;

    fn undo(&mut self, ctx: &mut ReplayContext<'_>);

    fn redo(&mut self, ctx: &mut ReplayContext<'_>);

    /// Absorb `next` into `self`. Returns true if `next` need not be kept.
    fn combine(&mut self, _next: &dyn UndoOperation) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    /// Entities this operation touches.
    fn entities(&self) -> Vec<EntityId> {
        Vec::new()
    }
}

/// Repeated edits of one field collapse into a single operation that spans
/// the first `before` and the last `after`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEditOperation {
    pub modification: FieldModification,
}

impl FieldEditOperation {
    pub fn new(modification: FieldModification) -> Self {
        Self { modification }
    }
}

impl UndoOperation for FieldEditOperation {
    fn kind(&self) -> &str {
        "field_edit"
    }

    fn undo(&mut self, ctx: &mut ReplayContext<'_>) {
        let m = &self.modification;
        set_field(ctx.world, m.entity, &m.field, m.before.clone());
    }

    fn redo(&mut self, ctx: &mut ReplayContext<'_>) {
        let m = &self.modification;
        set_field(ctx.world, m.entity, &m.field, m.after.clone());
    }

    fn combine(&mut self, next: &dyn UndoOperation) -> bool {
        let Some(next) = next.as_any().downcast_ref::<FieldEditOperation>() else {
            return false;
        };
        let (mine, theirs) = (&mut self.modification, &next.modification);
        if mine.entity != theirs.entity || mine.field != theirs.field {
            return false;
        }
        mine.after = theirs.after.clone();
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn entities(&self) -> Vec<EntityId> {
        vec![self.modification.entity]
    }
}

fn set_field(world: &mut dyn World, entity: EntityId, field: &str, value: FieldValue) {
    match world.entity_mut(entity) {
        Some(target) => {
            if let Err(err) = target.set_field(field, value) {
                tracing::debug!(entity, field, error = %err, "undo replay could not set field");
            }
        }
        None => tracing::debug!(entity, field, "undo replay target no longer exists"),
    }
}

/// Everything recorded during one host undo group.
#[derive(Debug, Default)]
pub struct UndoTransaction {
    pub group: u64,
    pub modifications: Vec<FieldModification>,
    pub operations: Vec<Box<dyn UndoOperation>>,
}

impl UndoTransaction {
    pub fn new(group: u64) -> Self {
        Self {
            group,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty() && self.operations.is_empty()
    }

    /// Entities touched by this transaction, without duplicates.
    pub fn entities(&self) -> Vec<EntityId> {
        let mut entities: Vec<_> = self
            .modifications
            .iter()
            .map(|m| m.entity)
            .chain(self.operations.iter().flat_map(|op| op.entities()))
            .collect();
        entities.sort_unstable();
        entities.dedup();
        entities
    }

    fn undo(&mut self, ctx: &mut ReplayContext<'_>) {
        for m in self.modifications.iter().rev() {
            set_field(ctx.world, m.entity, &m.field, m.before.clone());
        }
        for op in self.operations.iter_mut().rev() {
            op.undo(ctx);
        }
    }

    fn redo(&mut self, ctx: &mut ReplayContext<'_>) {
        for m in &self.modifications {
            set_field(ctx.world, m.entity, &m.field, m.after.clone());
        }
        for op in &mut self.operations {
            op.redo(ctx);
        }
    }
}

/// Undo and redo stacks of transactions.
#[derive(Debug, Default)]
pub struct UndoLog {
    undo: Vec<UndoTransaction>,
    redo: Vec<UndoTransaction>,
    /// Open transaction for the current host group
    current: Option<UndoTransaction>,
    last_group: Option<u64>,
    host_had_entries: bool,
    max_depth: Option<usize>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(max_depth: Option<usize>) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// The open, not yet sealed transaction.
    pub fn pending(&self) -> Option<&UndoTransaction> {
        self.current.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty() || self.current.as_ref().is_some_and(|t| !t.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Drop both stacks and any pending data.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.current = None;
    }

    /// Track the host's undo stack. Call once per update cycle.
    pub fn observe_host(&mut self, state: HostUndoState) {
        let host_empty = state.undo_len == 0 && state.redo_len == 0;
        if host_empty && self.host_had_entries {
            tracing::debug!(group = state.group, "host undo history cleared");
            self.clear();
            self.host_had_entries = false;
            self.last_group = Some(state.group);
            return;
        }
        self.host_had_entries = !host_empty;

        if self.last_group != Some(state.group) {
            self.seal();
            self.current = Some(UndoTransaction::new(state.group));
            self.last_group = Some(state.group);
        }
    }

    /// Record a custom operation into the open transaction. It first tries
    /// to combine with a pending operation of the same kind.
    pub fn record(&mut self, op: Box<dyn UndoOperation>, mode: SyncMode) -> bool {
        if mode != SyncMode::Live {
            return false;
        }
        let Some(current) = self.current.as_mut() else {
            tracing::warn!(kind = op.kind(), "no open undo transaction, operation discarded");
            return false;
        };
        for existing in current.operations.iter_mut().rev() {
            if existing.kind() == op.kind() && existing.combine(op.as_ref()) {
                return true;
            }
        }
        current.operations.push(op);
        true
    }

    /// Merge host-reported modifications into the open transaction. An
    /// entry for the same entity and field takes the new `after` value.
    pub fn record_modifications(&mut self, mods: Vec<FieldModification>, mode: SyncMode) -> bool {
        if mode != SyncMode::Live || mods.is_empty() {
            return false;
        }
        let Some(current) = self.current.as_mut() else {
            tracing::warn!(count = mods.len(), "no open undo transaction, modifications discarded");
            return false;
        };
        for m in mods {
            match current
                .modifications
                .iter_mut()
                .find(|e| e.entity == m.entity && e.field == m.field)
            {
                Some(existing) => existing.after = m.after,
                None => current.modifications.push(m),
            }
        }
        true
    }

    /// Undo the most recent transaction. Returns the entities it touched.
    pub fn undo(&mut self, ctx: &mut ReplayContext<'_>) -> Vec<EntityId> {
        self.seal_and_reopen();
        let Some(mut transaction) = self.undo.pop() else {
            return Vec::new();
        };
        ctx.mode = SyncMode::Undoing;
        transaction.undo(ctx);
        ctx.mode = SyncMode::Live;

        let touched = transaction.entities();
        tracing::debug!(group = transaction.group, entities = touched.len(), "undo");
        self.redo.push(transaction);
        touched
    }

    /// Redo the most recently undone transaction. Returns the entities it
    /// touched.
    pub fn redo(&mut self, ctx: &mut ReplayContext<'_>) -> Vec<EntityId> {
        self.seal_and_reopen();
        let Some(mut transaction) = self.redo.pop() else {
            return Vec::new();
        };
        ctx.mode = SyncMode::Redoing;
        transaction.redo(ctx);
        ctx.mode = SyncMode::Live;

        let touched = transaction.entities();
        tracing::debug!(group = transaction.group, entities = touched.len(), "redo");
        self.undo.push(transaction);
        touched
    }

    /// Move the open transaction onto the undo stack if it holds anything.
    fn seal(&mut self) {
        let Some(transaction) = self.current.take() else {
            return;
        };
        if transaction.is_empty() {
            return;
        }
        self.undo.push(transaction);
        self.redo.clear();
        if let Some(max) = self.max_depth {
            let excess = self.undo.len().saturating_sub(max);
            self.undo.drain(..excess);
        }
    }

    fn seal_and_reopen(&mut self) {
        let group = self.current.as_ref().map(|t| t.group);
        self.seal();
        if let Some(group) = group {
            self.current = Some(UndoTransaction::new(group));
        }
    }
}
