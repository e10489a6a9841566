//! Per-type event handlers.
//!
//! A [`Translator`] owns the mapping between one kind of native entity and
//! its replicated objects. The dispatcher selects a translator by the
//! object's type tag and calls the matching callback. Every callback has a
//! no-op default, so a translator only overrides what it handles.

use crate::{
    diff, Converter, Dictionary, EntityId, GuidManager, IdentityMap, ObjectFlags, ObjectId,
    Property, PropertyPath, Session, SyncConfig, TypeTag, World,
};

/// Services a translator works with while handling one call.
pub struct SyncContext<'a> {
    pub session: &'a mut dyn Session,
    pub world: &'a mut dyn World,
    pub identity: &'a mut IdentityMap,
    pub guids: &'a mut GuidManager,
    pub config: &'a SyncConfig,
}

impl SyncContext<'_> {
    /// Whether `object` is locked by a user other than the local one.
    pub fn is_locked_by_other(&self, object: ObjectId) -> bool {
        self.session
            .object(object)
            .is_some_and(|o| o.is_locked_by_other(&self.config.local_user))
    }

    /// Show or hide the lock marker on the entity replicated by `object`.
    pub fn refresh_lock_marker(&mut self, object: ObjectId) {
        let locked = self.is_locked_by_other(object);
        if let Some(entity) = self.identity.entity_of(object) {
            self.world.set_lock_marker(entity, locked);
        }
    }
}

#[allow(unused_variables)]
pub trait Translator {
    /// Type tag of the objects this translator handles.
    fn type_tag(&self) -> &str;

    /// Called once before the first session connects.
    fn initialize(&mut self) {}

    fn on_session_connect(&mut self, ctx: &mut SyncContext<'_>) {}

    fn on_session_disconnect(&mut self, ctx: &mut SyncContext<'_>) {}

    /// Create a replicated object for a local entity, or decline with `None`
    /// so the next translator can try.
    fn try_create(&mut self, entity: EntityId, ctx: &mut SyncContext<'_>) -> Option<ObjectId>;

    /// A remote peer created `object`.
    fn on_create(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {}

    /// The session confirmed a locally created object.
    fn on_confirm_create(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {}

    /// A remote peer deleted `object`.
    fn on_delete(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {}

    /// The session confirmed a local deletion.
    fn on_confirm_delete(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {}

    fn on_lock(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {}

    fn on_unlock(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {}

    fn on_lock_owner_change(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {}

    fn on_direct_lock_change(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {}

    /// `object` moved under a new parent, at `child_index` among its siblings.
    fn on_parent_change(
        &mut self,
        object: ObjectId,
        child_index: Option<usize>,
        ctx: &mut SyncContext<'_>,
    ) {
    }

    /// The property at `path` was set.
    fn on_property_change(
        &mut self,
        object: ObjectId,
        path: &PropertyPath,
        ctx: &mut SyncContext<'_>,
    ) {
    }

    /// The dictionary field at `path` was removed.
    fn on_field_removed(
        &mut self,
        object: ObjectId,
        path: &PropertyPath,
        ctx: &mut SyncContext<'_>,
    ) {
    }

    /// `count` elements were inserted at `index` into the list at `path`.
    fn on_list_add(
        &mut self,
        object: ObjectId,
        path: &PropertyPath,
        index: usize,
        count: usize,
        ctx: &mut SyncContext<'_>,
    ) {
    }

    /// `count` elements were removed at `index` from the list at `path`.
    fn on_list_remove(
        &mut self,
        object: ObjectId,
        path: &PropertyPath,
        index: usize,
        count: usize,
        ctx: &mut SyncContext<'_>,
    ) {
    }
}

/// Translator for entities whose fields map one to one onto the root
/// dictionary of their object.
#[derive(Debug, Clone)]
pub struct EntityTranslator {
    type_tag: TypeTag,
    flags: ObjectFlags,
}

impl EntityTranslator {
    pub fn new(type_tag: impl Into<TypeTag>) -> Self {
        Self {
            type_tag: type_tag.into(),
            flags: ObjectFlags::NONE,
        }
    }

    pub fn with_flags(mut self, flags: ObjectFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Apply the whole root dictionary of `object` onto `entity`.
    fn apply_all(&self, object: ObjectId, entity: EntityId, ctx: &mut SyncContext<'_>) {
        let Some(dict) = root_dictionary(ctx.session, object) else {
            return;
        };
        let Some(target) = ctx.world.entity_mut(entity) else {
            return;
        };
        let converter = Converter::new(ctx.identity);
        let report = diff::apply_properties(target, dict, &converter, ctx.session.strings());
        tracing::trace!(
            object,
            entity,
            changed = ?report.changed,
            reset = ?report.reset,
            "applied object"
        );
    }

    /// Re-apply the top-level field that contains `path`. The root path
    /// re-applies everything.
    fn apply_path(&self, object: ObjectId, path: &PropertyPath, ctx: &mut SyncContext<'_>) {
        let Some(entity) = ctx.identity.entity_of(object) else {
            return;
        };
        let Some(field) = path.top_field() else {
            self.apply_all(object, entity, ctx);
            return;
        };
        let Some(dict) = root_dictionary(ctx.session, object) else {
            return;
        };
        let Some(target) = ctx.world.entity_mut(entity) else {
            return;
        };
        let converter = Converter::new(ctx.identity);
        diff::apply_field(target, field, dict.get(field), &converter, ctx.session.strings());
    }

    fn attach_to_parent(
        &self,
        object: ObjectId,
        child_index: Option<usize>,
        ctx: &mut SyncContext<'_>,
    ) {
        let Some(entity) = ctx.identity.entity_of(object) else {
            return;
        };
        let parent = ctx
            .session
            .object(object)
            .and_then(|o| o.parent())
            .and_then(|p| ctx.identity.entity_of(p));
        ctx.world.set_parent(entity, parent, child_index);
    }
}

fn root_dictionary(session: &dyn Session, object: ObjectId) -> Option<&Dictionary> {
    session.object(object)?.root().as_dictionary()
}

impl Translator for EntityTranslator {
    fn type_tag(&self) -> &str {
        &self.type_tag
    }

    fn try_create(&mut self, entity: EntityId, ctx: &mut SyncContext<'_>) -> Option<ObjectId> {
        let adapter = ctx.world.entity(entity)?;
        if adapter.type_tag() != self.type_tag {
            return None;
        }

        let mut dict = Dictionary::new();
        let converter = Converter::with_world(ctx.identity, &*ctx.world);
        diff::create_properties(adapter, &mut dict, &converter, ctx.session.strings_mut());

        let parent = ctx
            .world
            .parent_of(entity)
            .and_then(|p| ctx.identity.object_of(p));
        let object = ctx
            .session
            .create_object(&self.type_tag, Property::from(dict), self.flags, parent);
        ctx.identity.add(object, entity);
        tracing::debug!(entity, object, type_tag = %self.type_tag, "created object");
        Some(object)
    }

    fn on_create(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {
        if ctx.identity.contains_object(object) {
            return;
        }
        let Some(entity) = ctx.world.spawn(&self.type_tag) else {
            tracing::warn!(object, type_tag = %self.type_tag, "host could not spawn entity");
            return;
        };
        ctx.identity.add(object, entity);
        let index = ctx
            .session
            .object(object)
            .and_then(|o| o.parent())
            .and_then(|p| ctx.session.object(p))
            .and_then(|p| p.children().iter().position(|c| *c == object));
        self.attach_to_parent(object, index, ctx);
        ctx.guids
            .get_or_create_id(entity, ctx.config.deterministic_ids, &*ctx.world);
        self.apply_all(object, entity, ctx);
        ctx.refresh_lock_marker(object);
    }

    fn on_delete(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {
        let Some(entity) = ctx.identity.remove_object(object) else {
            return;
        };
        ctx.guids.remove(entity);
        ctx.world.despawn(entity);
    }

    fn on_confirm_delete(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {
        ctx.identity.remove_object(object);
    }

    fn on_lock(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {
        ctx.refresh_lock_marker(object);
    }

    fn on_unlock(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {
        ctx.refresh_lock_marker(object);
    }

    fn on_lock_owner_change(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {
        ctx.refresh_lock_marker(object);
    }

    fn on_direct_lock_change(&mut self, object: ObjectId, ctx: &mut SyncContext<'_>) {
        ctx.refresh_lock_marker(object);
    }

    fn on_parent_change(
        &mut self,
        object: ObjectId,
        child_index: Option<usize>,
        ctx: &mut SyncContext<'_>,
    ) {
        self.attach_to_parent(object, child_index, ctx);
    }

    fn on_property_change(
        &mut self,
        object: ObjectId,
        path: &PropertyPath,
        ctx: &mut SyncContext<'_>,
    ) {
        self.apply_path(object, path, ctx);
    }

    fn on_field_removed(
        &mut self,
        object: ObjectId,
        path: &PropertyPath,
        ctx: &mut SyncContext<'_>,
    ) {
        self.apply_path(object, path, ctx);
    }

    fn on_list_add(
        &mut self,
        object: ObjectId,
        path: &PropertyPath,
        _index: usize,
        _count: usize,
        ctx: &mut SyncContext<'_>,
    ) {
        self.apply_path(object, path, ctx);
    }

    fn on_list_remove(
        &mut self,
        object: ObjectId,
        path: &PropertyPath,
        _index: usize,
        _count: usize,
        ctx: &mut SyncContext<'_>,
    ) {
        self.apply_path(object, path, ctx);
    }
}
