//! In-memory gateway for tests and embedders that persist elsewhere.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::PersistenceGateway;
use crate::error::{StoreError, StoreResult};
use crate::namespace::NodeMap;


/// Keeps namespace documents in a map. Saves can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    documents: Mutex<HashMap<String, NodeMap>>,
    normalized: HashSet<String>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `namespace` as lowercasing its identifiers.
    pub fn with_normalized(mut self, namespace: &str) -> Self {
        self.normalized.insert(namespace.to_string());
        self
    }

    /// Seed the stored document of a namespace.
    pub fn with_document(self, namespace: &str, entities: NodeMap) -> Self {
        self.documents.lock().insert(namespace.to_string(), entities);
        self
    }

    /// The last successfully saved (or seeded) document of a namespace.
    pub fn document(&self, namespace: &str) -> Option<NodeMap> {
        self.documents.lock().get(namespace).cloned()
    }

    /// Number of successful saves across all namespaces.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make subsequent saves fail with an I/O error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl PersistenceGateway for MemoryGateway {
    fn load(&self, namespace: &str) -> StoreResult<NodeMap> {
        Ok(self.document(namespace).unwrap_or_default())
    }

    fn save(&self, namespace: &str, entities: &NodeMap) -> StoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                target: namespace.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "saves disabled"),
            });
        }
        self.documents
            .lock()
            .insert(namespace.to_string(), entities.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_case_normalized(&self, namespace: &str) -> bool {
        self.normalized.contains(namespace)
    }
}
