//! # Tandem Engine
//!
//! Keeps a host application's scene graph and a replicated property tree in
//! step.
//!
//! A collaborative session holds a tree of replicated objects, each carrying
//! a typed property tree. The host holds native entities with typed fields.
//! This crate reconciles the two in both directions: local edits become
//! minimal property changes, and remote changes are applied onto entities.
//!
//! ## Design Principles
//!
//! - **No IO**: The engine never touches files or the network; sessions and
//!   worlds are traits
//! - **Identity preserving**: Merges update trees in place, so listeners can
//!   tell a modified node from a replaced one
//! - **Single threaded**: Every service runs on the host's update thread
//!
//! ## Core Concepts
//!
//! ### Property Tree
//!
//! [`Property`] nodes are values, dictionaries, or lists. Each node carries a
//! [`Serial`] that survives in-place merges but not clones.
//!
//! ### Identity Map
//!
//! [`IdentityMap`] is the bijection between replicated objects and native
//! entities.
//!
//! ### Diff and Merge
//!
//! The [`diff`] module snapshots entities, applies dictionaries back onto
//! them, and merges property trees in place.
//!
//! ### Events
//!
//! [`EventDispatcher`] routes [`SessionEvent`]s to the [`Translator`]
//! registered for the object's type, then to any listeners.
//!
//! ### Undo
//!
//! [`UndoLog`] groups host edits into transactions that replay without being
//! recorded again.
//!
//! ### Stable Ids
//!
//! [`GuidManager`] gives every entity a UUID that survives reload, derived
//! from its natural key when configured to.
//!
//! ## Quick Start
//!
//! ```rust
//! use tandem_engine::{
//!     EntitySchema, EntityTranslator, FieldDef, FieldType, FieldValue,
//!     MemorySession, Scene, SchemaRegistry, SyncConfig, SyncEngine, SyncOutcome, World,
//! };
//!
//! // 1. Describe the host's entity types
//! let registry = SchemaRegistry::new(1).with(EntitySchema::new(
//!     "light",
//!     vec![FieldDef::synced("intensity", FieldType::Float, FieldValue::Float(1.0))],
//! ));
//! let mut scene = Scene::new(registry, "level-1");
//!
//! // 2. Connect an engine to a session
//! let mut session = MemorySession::new();
//! let mut engine = SyncEngine::new(SyncConfig::default());
//! engine.register(EntityTranslator::new("light")).unwrap();
//! engine.connect(&mut session, &mut scene);
//!
//! // 3. Replicate an entity and send an edit
//! let lamp = scene.spawn("light").unwrap();
//! let object = engine.create(lamp, &mut session, &mut scene).unwrap();
//! scene.set(lamp, "intensity", 4.0).unwrap();
//! assert!(matches!(
//!     engine.sync_entity(lamp, &mut session, &mut scene),
//!     SyncOutcome::Sent(_)
//! ));
//!
//! // 4. Compare replicas
//! let sum = engine.checksum_object(object, &session).unwrap();
//! assert_ne!(sum, 0);
//! ```
//!
//! ## Persistence
//!
//! Use [`SyncEngine::save_ids`] and [`SyncEngine::load_ids`] with
//! [`GuidList`] to persist stable ids. Lists serialize to JSON with
//! deterministic ordering.

pub mod checksum;
pub mod config;
pub mod convert;
pub mod diff;
pub mod dispatcher;
pub mod engine;
pub mod entity;
pub mod error;
pub mod event;
pub mod guid;
pub mod guid_list;
pub mod identity;
pub mod listeners;
pub mod locks;
pub mod object;
pub mod property;
pub mod scene;
pub mod schema;
pub mod session;
pub mod translator;
pub mod undo;

// Re-export main types at crate root
pub use checksum::{Checksum, Fletcher64};
pub use config::{ConfigError, SyncConfig};
pub use convert::{Converted, Converter};
pub use diff::{ApplyReport, FieldApply, SendReport};
pub use dispatcher::EventDispatcher;
pub use engine::{SyncEngine, SyncOutcome};
pub use entity::{EntityAdapter, FieldValue, NaturalKey, World};
pub use error::{Error, Result};
pub use event::{EventKey, SessionEvent};
pub use guid::GuidManager;
pub use guid_list::{GuidEntry, GuidList, ID_LIST_FORMAT_VERSION};
pub use identity::IdentityMap;
pub use listeners::{Listener, ListenerHandle, ListenerRegistry, TypeHierarchy};
pub use locks::{EditAuthority, LockTracker};
pub use object::{LockState, ObjectFlags, ReplicatedObject};
pub use property::{
    Dictionary, List, PathSegment, Property, PropertyData, PropertyPath, PropertyType, Serial,
    StringTable, Value, ValueData,
};
pub use scene::{DynamicEntity, Scene};
pub use schema::{EntitySchema, FieldDef, FieldType, SchemaRegistry};
pub use session::{MemorySession, Request, Session};
pub use translator::{EntityTranslator, SyncContext, Translator};
pub use undo::{
    FieldEditOperation, FieldModification, HostUndoState, ReplayContext, SyncMode,
    UndoLog, UndoOperation, UndoTransaction,
};

/// Type aliases for clarity
pub type ObjectId = u32;
pub type EntityId = u64;
pub type StringId = u32;
pub type TypeTag = String;
pub type UserId = String;
pub type SchemaVersion = u32;
