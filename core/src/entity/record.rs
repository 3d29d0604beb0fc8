//! Context-scoped access to one user or group.
//!
//! A record holds only its namespace and identifier. Every call locks the
//! namespace and re-resolves the identifier against the shared tree, so any
//! number of records for the same entity see each other's writes at once.
//!
//! Writes work on a copy of the entity subtree: the change is applied,
//! empty containers are pruned, and only then is the copy put back (or the
//! entity deleted if nothing is left). A malformed subtree therefore fails
//! the write without touching the stored state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::identity;
use super::overlay::{normalize_context, AttributeKind, ContextOverlay};
use super::prune::{prune, PruneOutcome};
use crate::error::{StoreError, StoreResult};
use crate::events::{ChangeEvent, ChangeKind};
use crate::namespace::node::is_blank;
use crate::namespace::{entity_path, FlushStatus, Namespace, NamespaceState, Node, NodeMap, NodePath};


/// Values keyed by context; `None` is the common context.
pub type ContextMap<T> = BTreeMap<Option<String>, T>;


/// View of one entity in one namespace.
#[derive(Debug)]
pub struct EntityRecord {
    namespace: Arc<Namespace>,
    identifier: RwLock<String>,
}

impl EntityRecord {
    /// Bind a record to `name`, resolving it to the stored spelling if the
    /// entity exists. Nothing is written; an unknown name is virtual.
    pub fn new(namespace: Arc<Namespace>, name: &str) -> Self {
        let (identifier, is_virtual) = {
            let state = namespace.lock();
            identity::find_or_create(&state.entities, name, namespace.is_case_normalized())
        };
        debug!(namespace = namespace.name(), identifier = %identifier, is_virtual, "entity record bound");
        EntityRecord {
            namespace,
            identifier: RwLock::new(identifier),
        }
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    pub fn identifier(&self) -> String {
        self.identifier.read().clone()
    }

    /// True while the entity has no stored subtree.
    pub fn is_virtual(&self) -> bool {
        let state = self.namespace.lock();
        self.resolve(&state).1
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// Permissions of `context`, in stored order. Empty if none are set.
    pub fn permissions(&self, context: Option<&str>) -> Vec<String> {
        let path = self.overlay().path(context, AttributeKind::Permissions);
        self.with_entity(|entity| list_at(entity, &path))
            .unwrap_or_default()
    }

    /// Parent names of `context`, with blank entries dropped.
    pub fn parents(&self, context: Option<&str>) -> Vec<String> {
        let path = self.overlay().path(context, AttributeKind::Parents);
        self.with_entity(|entity| parents_at(entity, &path))
            .unwrap_or_default()
    }

    /// A single option value of `context`. A dotted key also finds a value
    /// stored in nested maps, matching the keys `options` lists. A blank key
    /// names no option.
    pub fn option(&self, context: Option<&str>, key: &str) -> Option<String> {
        if is_blank(key) {
            return None;
        }
        let path = self.overlay().path(context, AttributeKind::Options);
        self.with_entity(|entity| match entity.get(&path)? {
            None => Ok(None),
            Some(Node::Map(children)) => Ok(find_option(children, key).map(|(_, value)| value.to_string())),
            Some(_) => Err(StoreError::malformed(path.to_slashed(), "a map")),
        })
        .flatten()
    }

    /// All options of `context`. Options nested in sub-maps are returned
    /// with dot-joined keys (`chat.prefix`).
    pub fn options(&self, context: Option<&str>) -> BTreeMap<String, String> {
        let path = self.overlay().path(context, AttributeKind::Options);
        self.with_entity(|entity| options_at(entity, &path))
            .unwrap_or_default()
    }

    /// Names of the non-common contexts this entity has data for.
    pub fn contexts(&self) -> BTreeSet<String> {
        let overlay = self.overlay().clone();
        self.with_entity(|entity| overlay.contexts(entity))
            .unwrap_or_default()
    }

    /// Permissions of the common context and of every named context.
    pub fn permissions_map(&self) -> ContextMap<Vec<String>> {
        self.per_context(AttributeKind::Permissions, list_at)
    }

    /// Options of the common context and of every named context.
    pub fn options_map(&self) -> ContextMap<BTreeMap<String, String>> {
        self.per_context(AttributeKind::Options, options_at)
    }

    /// Parents of the common context and of every named context.
    pub fn parents_map(&self) -> ContextMap<Vec<String>> {
        self.per_context(AttributeKind::Parents, parents_at)
    }

    /// Copy of the stored subtree, or `None` while virtual.
    pub fn snapshot(&self) -> Option<Node> {
        self.with_entity(|entity| Ok(entity.clone()))
    }

    // -------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------

    /// Replace the permissions of `context`. An empty list (or one holding
    /// only blank entries) clears them and prunes what is left empty.
    pub fn set_permissions<I, S>(&self, context: Option<&str>, permissions: I) -> StoreResult<FlushStatus>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_list(context, AttributeKind::Permissions, collect(permissions))
    }

    pub fn clear_permissions(&self, context: Option<&str>) -> StoreResult<FlushStatus> {
        self.set_list(context, AttributeKind::Permissions, Vec::new())
    }

    /// Put `permission` first in the list of `context`, moving it there if it
    /// is already present.
    pub fn add_permission(&self, context: Option<&str>, permission: &str) -> StoreResult<FlushStatus> {
        self.update_list(context, AttributeKind::Permissions, |list| {
            list.retain(|p| p != permission);
            list.insert(0, permission.to_string());
        })
    }

    pub fn remove_permission(&self, context: Option<&str>, permission: &str) -> StoreResult<FlushStatus> {
        self.update_list(context, AttributeKind::Permissions, |list| {
            list.retain(|p| p != permission);
        })
    }

    /// Set or, with `None` or an empty value, remove one option. An option
    /// already stored in nested maps under a dotted key is updated where it
    /// is; a new key is stored as one segment.
    pub fn set_option(&self, context: Option<&str>, key: &str, value: Option<&str>) -> StoreResult<FlushStatus> {
        if is_blank(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let options = self.overlay().path(context, AttributeKind::Options);
        let value = value.filter(|v| !v.is_empty()).map(str::to_string);
        self.mutate(context, ChangeKind::Options, |entity| {
            let path = match entity.get(&options) {
                Ok(Some(Node::Map(children))) => match find_option(children, key) {
                    Some((segments, _)) => segments.into_iter().fold(options.clone(), |p, s| p.child(s)),
                    None => options.child(key),
                },
                _ => options.child(key),
            };
            match value {
                Some(value) => entity.insert(&path, Node::Leaf(value))?,
                None => {
                    entity.remove(&path)?;
                }
            }
            Ok(path)
        })
    }

    /// Replace the parents of `context`; same clearing rules as
    /// permissions.
    pub fn set_parents<I, S>(&self, context: Option<&str>, parents: I) -> StoreResult<FlushStatus>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_list(context, AttributeKind::Parents, collect(parents))
    }

    pub fn clear_parents(&self, context: Option<&str>) -> StoreResult<FlushStatus> {
        self.set_list(context, AttributeKind::Parents, Vec::new())
    }

    /// Append each of `parents` to the parents of `context` unless already
    /// present.
    pub fn add_parents<I, S>(&self, context: Option<&str>, parents: I) -> StoreResult<FlushStatus>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let added = collect(parents);
        self.update_list(context, AttributeKind::Parents, |list| {
            for parent in added {
                if !list.contains(&parent) {
                    list.push(parent);
                }
            }
        })
    }

    pub fn remove_parents<I, S>(&self, context: Option<&str>, parents: I) -> StoreResult<FlushStatus>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed = collect(parents);
        self.update_list(context, AttributeKind::Parents, |list| {
            list.retain(|p| !removed.contains(p));
        })
    }

    /// Rename the entity. Returns false, changing nothing, if `new_name`
    /// already denotes an entity in this namespace.
    pub fn set_identifier(&self, new_name: &str) -> bool {
        self.rename(new_name).is_some()
    }

    /// Like `set_identifier`, but hands back the flush outcome of a
    /// successful rename.
    pub fn rename(&self, new_name: &str) -> Option<FlushStatus> {
        let normalized = self.namespace.is_case_normalized();
        let mut state = self.namespace.lock();
        let mut identifier = self.identifier.write();
        let (old_key, is_virtual) = identity::find_or_create(&state.entities, &identifier, normalized);

        let new_key = identity::rename(&mut state.entities, &old_key, new_name, normalized)?;
        *identifier = new_key.clone();

        if is_virtual {
            return Some(FlushStatus::Flushed);
        }
        state.mark_dirty();
        let status = self.namespace.flush(&mut state);
        self.namespace.emit(ChangeEvent {
            namespace: self.namespace.name().to_string(),
            entity: new_key,
            context: None,
            change: ChangeKind::Renamed { from: old_key },
        });
        Some(status)
    }

    /// Delete the whole entity and flush. Removing a virtual entity only
    /// flushes.
    pub fn remove(&self) -> FlushStatus {
        let mut state = self.namespace.lock();
        let (key, _) = self.resolve(&state);
        self.remove_locked(&mut state, &key)
    }

    /// Materialize a virtual entity (as an empty record) and flush.
    pub fn save(&self) -> StoreResult<FlushStatus> {
        let mut state = self.namespace.lock();
        let (key, is_virtual) = self.resolve(&state);
        if is_virtual {
            if state.entities.contains_key(&key) {
                return Err(self.malformed_entity(&key));
            }
            state.entities.insert(key.clone(), Node::empty_map());
            debug!(namespace = self.namespace.name(), entity = %key, "virtual entity materialized");
            self.namespace.emit(self.event(&key, None, ChangeKind::Saved));
        }
        state.mark_dirty();
        Ok(self.namespace.flush(&mut state))
    }

    // -------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------

    fn overlay(&self) -> &ContextOverlay {
        self.namespace.overlay()
    }

    /// Stored key and virtual flag for the current identifier.
    fn resolve(&self, state: &NamespaceState) -> (String, bool) {
        let identifier = self.identifier.read();
        identity::find_or_create(&state.entities, &identifier, self.namespace.is_case_normalized())
    }

    /// Run `read` against the stored subtree. Virtual entities and
    /// malformed data both yield `None`.
    fn with_entity<T>(&self, read: impl FnOnce(&Node) -> StoreResult<T>) -> Option<T> {
        let state = self.namespace.lock();
        let (key, is_virtual) = self.resolve(&state);
        if is_virtual {
            return None;
        }
        let entity = state.entities.get(&key)?;
        match read(entity) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    namespace = self.namespace.name(),
                    entity = %key,
                    error = %e,
                    "malformed entity data; reading as empty"
                );
                None
            }
        }
    }

    /// Read one attribute of every context under a single lock. A malformed
    /// slot reads as empty without hiding the other contexts.
    fn per_context<T: Default>(
        &self,
        kind: AttributeKind,
        read: impl Fn(&Node, &NodePath) -> StoreResult<T>,
    ) -> ContextMap<T> {
        let overlay = self.overlay();
        let mut out = self
            .with_entity(|entity| {
                let mut out = ContextMap::new();
                out.insert(None, self.or_empty(read(entity, &overlay.path(None, kind))));
                for context in self.or_empty(overlay.contexts(entity)) {
                    let value = self.or_empty(read(entity, &overlay.path(Some(context.as_str()), kind)));
                    out.insert(Some(context), value);
                }
                Ok(out)
            })
            .unwrap_or_default();
        out.entry(None).or_default();
        out
    }

    fn or_empty<T: Default>(&self, result: StoreResult<T>) -> T {
        result.unwrap_or_else(|e| {
            warn!(namespace = self.namespace.name(), error = %e, "malformed entity data; reading as empty");
            T::default()
        })
    }

    fn set_list(&self, context: Option<&str>, kind: AttributeKind, items: Vec<String>) -> StoreResult<FlushStatus> {
        let path = self.overlay().path(context, kind);
        self.mutate(context, change_for(kind), |entity| {
            entity.insert(&path, Node::List(items))?;
            Ok(path)
        })
    }

    fn update_list(
        &self,
        context: Option<&str>,
        kind: AttributeKind,
        update: impl FnOnce(&mut Vec<String>),
    ) -> StoreResult<FlushStatus> {
        let path = self.overlay().path(context, kind);
        self.mutate(context, change_for(kind), |entity| {
            let mut list = list_at(entity, &path)?;
            update(&mut list);
            entity.insert(&path, Node::List(list))?;
            Ok(path)
        })
    }

    /// Apply `apply` to a copy of the entity, prune upward from the path it
    /// reports touching, then store the copy or delete the entity if nothing
    /// is left.
    fn mutate(
        &self,
        context: Option<&str>,
        change: ChangeKind,
        apply: impl FnOnce(&mut Node) -> StoreResult<NodePath>,
    ) -> StoreResult<FlushStatus> {
        let mut state = self.namespace.lock();
        let (key, is_virtual) = self.resolve(&state);

        let mut entity = match state.entities.get(&key) {
            Some(node @ Node::Map(_)) if !is_virtual => node.clone(),
            None => Node::empty_map(),
            Some(_) => return Err(self.malformed_entity(&key)),
        };

        let touched = apply(&mut entity).map_err(|e| self.qualify(&key, e))?;
        let outcome = prune(&mut entity, &touched).map_err(|e| self.qualify(&key, e))?;

        let context = normalize_context(context).map(str::to_string);
        self.namespace.emit(self.event(&key, context, change));

        let status = match outcome {
            PruneOutcome::EntityEmpty => self.remove_locked(&mut state, &key),
            PruneOutcome::Retained => {
                state.entities.insert(key, entity);
                state.mark_dirty();
                self.namespace.flush(&mut state)
            }
        };
        Ok(status)
    }

    fn remove_locked(&self, state: &mut NamespaceState, key: &str) -> FlushStatus {
        if state.entities.remove(key).is_some() {
            info!(namespace = self.namespace.name(), entity = key, "entity removed");
            self.namespace.emit(self.event(key, None, ChangeKind::Removed));
        }
        state.mark_dirty();
        self.namespace.flush(state)
    }

    fn event(&self, key: &str, context: Option<String>, change: ChangeKind) -> ChangeEvent {
        ChangeEvent {
            namespace: self.namespace.name().to_string(),
            entity: key.to_string(),
            context,
            change,
        }
    }

    fn malformed_entity(&self, key: &str) -> StoreError {
        StoreError::malformed(entity_path(self.namespace.name(), key).to_slashed(), "a map")
    }

    /// Prefix entity-relative paths in malformed-document errors.
    fn qualify(&self, key: &str, err: StoreError) -> StoreError {
        match err {
            StoreError::MalformedDocument { path, expected } => StoreError::MalformedDocument {
                path: format!("{}/{}", entity_path(self.namespace.name(), key), path),
                expected,
            },
            other => other,
        }
    }
}


fn change_for(kind: AttributeKind) -> ChangeKind {
    match kind {
        AttributeKind::Permissions => ChangeKind::Permissions,
        AttributeKind::Options => ChangeKind::Options,
        AttributeKind::Parents => ChangeKind::Parents,
    }
}


fn collect<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().to_string()).collect()
}


/// The list at `path`; a missing node is an empty list.
fn list_at(entity: &Node, path: &NodePath) -> StoreResult<Vec<String>> {
    match entity.get(path)? {
        None => Ok(Vec::new()),
        Some(Node::List(items)) => Ok(items.clone()),
        Some(_) => Err(StoreError::malformed(path.to_slashed(), "a list")),
    }
}


fn parents_at(entity: &Node, path: &NodePath) -> StoreResult<Vec<String>> {
    let mut parents = list_at(entity, path)?;
    parents.retain(|p| !is_blank(p));
    Ok(parents)
}


fn options_at(entity: &Node, path: &NodePath) -> StoreResult<BTreeMap<String, String>> {
    match entity.get(path)? {
        None => Ok(BTreeMap::new()),
        Some(Node::Map(children)) => {
            let mut out = BTreeMap::new();
            collect_options(children, "", &mut out);
            Ok(out)
        }
        Some(_) => Err(StoreError::malformed(path.to_slashed(), "a map")),
    }
}


/// Locate the leaf that `collect_options` lists under `key`: the literal
/// key first, then dot-separated descent into nested maps. Later siblings
/// win, as they do when listing.
fn find_option<'a>(children: &'a NodeMap, key: &str) -> Option<(Vec<String>, &'a str)> {
    if let Some(Node::Leaf(value)) = children.get(key) {
        return Some((vec![key.to_string()], value));
    }
    children.iter().rev().find_map(|(name, node)| {
        let rest = key
            .strip_prefix(name.as_str())?
            .strip_prefix('.')
            .filter(|rest| !rest.is_empty())?;
        let Node::Map(nested) = node else {
            return None;
        };
        let (mut segments, value) = find_option(nested, rest)?;
        segments.insert(0, name.clone());
        Some((segments, value))
    })
}


fn collect_options(children: &NodeMap, prefix: &str, out: &mut BTreeMap<String, String>) {
    for (key, node) in children {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match node {
            Node::Leaf(value) => {
                out.insert(full, value.clone());
            }
            Node::Map(nested) => collect_options(nested, &full, out),
            Node::List(_) => {}
        }
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
