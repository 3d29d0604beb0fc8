//! Persistence gateways, the document stores namespaces are loaded from
//! and flushed to.
//!
//! The store only needs a hierarchical key/value tree per namespace; how
//! that tree is kept on disk (or not at all) is up to the gateway.

pub mod file;
pub mod memory;

pub use file::YamlFileGateway;
pub use memory::MemoryGateway;

use crate::error::StoreResult;
use crate::namespace::NodeMap;


/// A backing document store for one or more namespaces.
pub trait PersistenceGateway: Send + Sync {
    /// Read the entity map of `namespace`. A namespace that was never saved
    /// loads as an empty map.
    fn load(&self, namespace: &str) -> StoreResult<NodeMap>;

    /// Replace the stored entity map of `namespace` and persist it.
    fn save(&self, namespace: &str, entities: &NodeMap) -> StoreResult<()>;

    /// Whether identifiers in `namespace` are stored lowercased.
    fn is_case_normalized(&self, namespace: &str) -> bool;

    /// Re-read the backing document, discarding anything cached.
    fn refresh(&self) -> StoreResult<()> {
        Ok(())
    }

    /// True if the backing document changed outside this process since it
    /// was last read or written.
    fn externally_modified(&self) -> bool {
        false
    }
}
