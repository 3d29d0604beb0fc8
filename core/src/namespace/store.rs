//! Shared in-memory namespace state.
//!
//! A `Namespace` owns the entity map of one base path (`users`, `groups`)
//! behind a single mutex. Entity records lock it for the whole of a public
//! operation (mutation, prune cascade and flush), so concurrent readers
//! never observe a half-applied change.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error};

use super::flush::FlushStatus;
use super::node::{Node, NodeMap};
use crate::entity::overlay::ContextOverlay;
use crate::error::StoreResult;
use crate::events::{ChangeEvent, EventSink};
use crate::gateway::PersistenceGateway;


/// The mutable part of a namespace, only reachable through the lock.
#[derive(Debug, Default)]
pub struct NamespaceState {
    /// Persisted entities, keyed by canonical identifier.
    pub entities: NodeMap,
    /// Set by every mutation, cleared by a successful flush.
    dirty: bool,
}

impl NamespaceState {
    pub fn new(entities: NodeMap) -> Self {
        NamespaceState { entities, dirty: false }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}


/// One named collection of entities sharing a lookup policy.
pub struct Namespace {
    name: String,
    case_normalized: bool,
    overlay: ContextOverlay,
    state: Mutex<NamespaceState>,
    gateway: Arc<dyn PersistenceGateway>,
    events: EventSink,
}

impl Namespace {
    /// Load `name` from the gateway.
    ///
    /// The lookup policy is read from the gateway once, here.
    pub fn open(
        name: &str,
        overlay: ContextOverlay,
        gateway: Arc<dyn PersistenceGateway>,
        events: EventSink,
    ) -> StoreResult<Arc<Namespace>> {
        let entities = gateway.load(name)?;
        let case_normalized = gateway.is_case_normalized(name);
        debug!(
            namespace = name,
            entities = entities.len(),
            case_normalized,
            "namespace loaded"
        );
        Ok(Arc::new(Namespace {
            name: name.to_string(),
            case_normalized,
            overlay,
            state: Mutex::new(NamespaceState::new(entities)),
            gateway,
            events,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_case_normalized(&self) -> bool {
        self.case_normalized
    }

    pub fn overlay(&self) -> &ContextOverlay {
        &self.overlay
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, NamespaceState> {
        self.state.lock()
    }

    /// Identifiers of all persisted entities, sorted. Virtual entities never
    /// appear here.
    pub fn entity_names(&self) -> Vec<String> {
        self.lock()
            .entities
            .iter()
            .filter(|(_, node)| matches!(node, Node::Map(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Clone of the whole entity map.
    pub fn export(&self) -> NodeMap {
        self.lock().entities.clone()
    }

    /// Push the current entity map to the gateway.
    ///
    /// Callers hold the lock, so flushes of one namespace are serialized and
    /// the gateway always receives the newest state last.
    pub(crate) fn flush(&self, state: &mut NamespaceState) -> FlushStatus {
        match self.gateway.save(&self.name, &state.entities) {
            Ok(()) => {
                state.dirty = false;
                FlushStatus::Flushed
            }
            Err(e) => {
                error!(namespace = %self.name, error = %e, "error saving namespace; change kept in memory");
                FlushStatus::Failed(e)
            }
        }
    }

    /// Flush only if something changed since the last successful flush.
    pub fn flush_if_dirty(&self) -> FlushStatus {
        let mut state = self.lock();
        if !state.is_dirty() {
            return FlushStatus::Flushed;
        }
        self.flush(&mut state)
    }

    /// Replace the in-memory map with what the gateway holds now.
    ///
    /// Unflushed changes are discarded.
    pub fn reload(&self) -> StoreResult<()> {
        let entities = self.gateway.load(&self.name)?;
        let mut state = self.lock();
        *state = NamespaceState::new(entities);
        debug!(namespace = %self.name, entities = state.entities.len(), "namespace reloaded");
        Ok(())
    }

    pub(crate) fn emit(&self, event: ChangeEvent) {
        self.events.emit(event);
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("case_normalized", &self.case_normalized)
            .field("overlay", &self.overlay)
            .finish_non_exhaustive()
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;

    fn seeded() -> Arc<MemoryGateway> {
        let mut users = NodeMap::new();
        users.insert("steve".into(), Node::empty_map());
        users.insert("alex".into(), Node::empty_map());
        users.insert("broken".into(), Node::leaf("not an entity"));
        Arc::new(MemoryGateway::new().with_normalized("users").with_document("users", users))
    }

    fn open(gw: Arc<MemoryGateway>) -> Arc<Namespace> {
        Namespace::open("users", ContextOverlay::default(), gw, EventSink::disabled()).unwrap()
    }

    #[test]
    fn open_reads_policy_and_entities() {
        let ns = open(seeded());
        assert!(ns.is_case_normalized());
        assert_eq!(ns.name(), "users");
        assert_eq!(ns.entity_names(), vec!["alex", "steve"]);
    }

    #[test]
    fn flush_clears_dirty() {
        let gw = seeded();
        let ns = open(gw.clone());
        {
            let mut state = ns.lock();
            state.entities.remove("alex");
            state.mark_dirty();
            assert!(ns.flush(&mut state).is_flushed());
            assert!(!state.is_dirty());
        }
        assert!(!gw.document("users").unwrap().contains_key("alex"));
    }

    #[test]
    fn failed_flush_keeps_memory_and_dirty_flag() {
        let gw = seeded();
        let ns = open(gw.clone());
        gw.fail_saves(true);
        {
            let mut state = ns.lock();
            state.entities.remove("alex");
            state.mark_dirty();
            assert!(!ns.flush(&mut state).is_flushed());
            assert!(state.is_dirty());
        }
        assert_eq!(ns.entity_names(), vec!["steve"]);

        gw.fail_saves(false);
        assert!(ns.flush_if_dirty().is_flushed());
        assert!(!gw.document("users").unwrap().contains_key("alex"));
    }

    #[test]
    fn flush_if_dirty_skips_clean_namespace() {
        let gw = seeded();
        let ns = open(gw.clone());
        assert!(ns.flush_if_dirty().is_flushed());
        assert_eq!(gw.save_count(), 0);
    }

    #[test]
    fn reload_discards_unflushed_changes() {
        let ns = open(seeded());
        ns.lock().entities.clear();
        assert!(ns.entity_names().is_empty());
        ns.reload().unwrap();
        assert_eq!(ns.entity_names().len(), 2);
    }
}
