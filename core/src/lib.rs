//! Context-scoped permission store.
//!
//! Users and groups carry permissions, options and parent links, each either
//! in the common context or in a named context (a world). Entities that were
//! only looked up stay virtual until they receive data, and containers
//! emptied by a write are pruned from the stored document.
//!
//! ```no_run
//! use std::path::Path;
//! use permstore_core::{config::StoreConfig, EventSink, PermissionBackend};
//!
//! let backend = PermissionBackend::open_file(Path::new("/etc/permstore"), StoreConfig::default(), EventSink::disabled())?;
//! let steve = backend.user("Steve");
//! steve.add_permission(Some("nether"), "-build.*")?.into_result()?;
//! assert_eq!(steve.permissions(Some("nether")), vec!["-build.*"]);
//! # Ok::<(), permstore_core::StoreError>(())
//! ```

pub mod backend;
pub mod cli;
pub mod command;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod gateway;
pub mod help;
pub mod namespace;
pub mod sys;

pub use backend::{EntityKind, PermissionBackend};
pub use entity::{ContextOverlay, EntityRecord};
pub use error::{StoreError, StoreResult};
pub use events::{ChangeEvent, ChangeKind, EventSink};
pub use gateway::{MemoryGateway, PersistenceGateway, YamlFileGateway};
pub use namespace::{FlushStatus, Namespace, Node, NodeMap, NodePath};
