//! Identifier resolution within a namespace.
//!
//! A case-normalized namespace stores lowercased identifiers and only does
//! exact lookups of the lowercased name. Other namespaces keep the stored
//! spelling; a lookup tries the exact key first and then scans the
//! top-level keys case-insensitively. The scan is linear in the entity
//! count, which stays small and is only paid on a miss.

use tracing::{debug, info};

use crate::namespace::{Node, NodeMap};


/// The stored form of `name` under the namespace policy.
pub fn canonicalize(name: &str, case_normalized: bool) -> String {
    if case_normalized {
        name.to_lowercase()
    } else {
        name.to_string()
    }
}


/// Find the stored key of an existing entity named `name`.
///
/// Only map nodes count as entities; a stray leaf under the namespace is
/// never returned.
pub fn find(entities: &NodeMap, name: &str, case_normalized: bool) -> Option<String> {
    let key = canonicalize(name, case_normalized);
    if let Some(Node::Map(_)) = entities.get(&key) {
        return Some(key);
    }
    if case_normalized {
        return None;
    }
    let wanted = key.to_lowercase();
    entities
        .iter()
        .find(|(stored, node)| matches!(node, Node::Map(_)) && stored.to_lowercase() == wanted)
        .map(|(stored, _)| stored.clone())
}


/// Resolve `name` to its stored key, or to the key it will be stored under
/// once saved. The flag is true when the entity is virtual (not stored).
pub fn find_or_create(entities: &NodeMap, name: &str, case_normalized: bool) -> (String, bool) {
    match find(entities, name, case_normalized) {
        Some(stored) => (stored, false),
        None => {
            debug!(name, "entity not stored; resolving as virtual");
            (canonicalize(name, case_normalized), true)
        }
    }
}


/// Move the subtree stored at `old` to the key for `new`.
///
/// Returns `None` without touching the map if `new` already names an
/// entity, or if its key holds anything else (a malformed node is never
/// overwritten). Otherwise returns the new stored key; if nothing was stored
/// at `old` (a virtual entity) the map is left as it is.
pub fn rename(
    entities: &mut NodeMap,
    old: &str,
    new: &str,
    case_normalized: bool,
) -> Option<String> {
    let target = canonicalize(new, case_normalized);
    if find(entities, new, case_normalized).is_some() || entities.contains_key(&target) {
        debug!(old, new, "rename target already exists");
        return None;
    }
    if let Some(Node::Map(_)) = entities.get(old) {
        if let Some(subtree) = entities.remove(old) {
            entities.insert(target.clone(), subtree);
            info!(old, new = %target, "entity renamed");
        }
    }
    Some(target)
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(names: &[&str]) -> NodeMap {
        names.iter().map(|n| (n.to_string(), Node::empty_map())).collect()
    }

    #[test]
    fn normalized_lookup_lowercases() {
        let map = entities(&["steve"]);
        assert_eq!(find(&map, "STEVE", true), Some("steve".into()));
        assert_eq!(find(&map, "Steve", true), Some("steve".into()));
    }

    #[test]
    fn normalized_lookup_does_not_scan() {
        // A mixed-case key in a normalized namespace is unreachable.
        let map = entities(&["Steve"]);
        assert_eq!(find(&map, "Steve", true), None);
    }

    #[test]
    fn unnormalized_exact_then_scan() {
        let map = entities(&["Admin", "admin2"]);
        assert_eq!(find(&map, "Admin", false), Some("Admin".into()));
        assert_eq!(find(&map, "ADMIN", false), Some("Admin".into()));
        assert_eq!(find(&map, "Admin2", false), Some("admin2".into()));
        assert_eq!(find(&map, "mod", false), None);
    }

    #[test]
    fn leaves_are_not_entities() {
        let mut map = entities(&[]);
        map.insert("ghost".into(), Node::leaf("x"));
        assert_eq!(find(&map, "ghost", false), None);
        assert_eq!(find(&map, "GHOST", false), None);
        assert_eq!(find(&map, "ghost", true), None);
    }

    #[test]
    fn find_or_create_reports_virtual() {
        let map = entities(&["steve"]);
        assert_eq!(find_or_create(&map, "Steve", true), ("steve".into(), false));
        assert_eq!(find_or_create(&map, "Alex", true), ("alex".into(), true));
        assert_eq!(find_or_create(&map, "Alex", false), ("Alex".into(), true));
    }

    #[test]
    fn rename_moves_subtree() {
        let mut alice = Node::empty_map();
        alice
            .insert(&crate::namespace::NodePath::new(["permissions"]), Node::list(["a"]))
            .unwrap();
        let mut map = NodeMap::new();
        map.insert("alice".into(), alice);
        let before = map["alice"].clone();
        assert_eq!(rename(&mut map, "alice", "Bob", true), Some("bob".into()));
        assert!(!map.contains_key("alice"));
        assert_eq!(map["bob"], before);
    }

    #[test]
    fn rename_to_existing_fails_unchanged() {
        let mut map = entities(&["alice", "bob"]);
        let before = map.clone();
        assert_eq!(rename(&mut map, "alice", "BOB", false), None);
        assert_eq!(map, before);
    }

    #[test]
    fn rename_onto_stray_leaf_fails_unchanged() {
        let mut map = entities(&["alice"]);
        map.insert("bob".into(), Node::leaf("junk"));
        let before = map.clone();
        assert_eq!(rename(&mut map, "alice", "bob", true), None);
        assert_eq!(rename(&mut map, "alice", "bob", false), None);
        assert_eq!(map, before);
    }

    #[test]
    fn rename_virtual_only_returns_key() {
        let mut map = entities(&["bob"]);
        assert_eq!(rename(&mut map, "carol", "Dave", false), Some("Dave".into()));
        assert_eq!(map, entities(&["bob"]));
    }
}
