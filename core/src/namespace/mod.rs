//! Namespace document model: paths, the node tree, shared namespace state
//! and flush reporting.

pub mod path;
pub mod node;
pub mod store;
pub mod flush;

pub use path::{entity_path, NodePath};
pub use node::{Node, NodeMap};
pub use store::{Namespace, NamespaceState};
pub use flush::FlushStatus;
