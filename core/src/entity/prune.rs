//! Pruning of containers left empty by a mutation.
//!
//! After a write at some path inside an entity, every ancestor of that path
//! is checked from the deepest up: an attribute container, then its context
//! subtree, then the contexts map. Nodes without content are removed.
//! Finally the entity itself is checked; an entity without content is
//! reported back so the caller can delete it from the namespace.

use tracing::debug;

use crate::error::StoreResult;
use crate::namespace::{Node, NodePath};


/// Whether the entity still holds content after pruning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneOutcome {
    Retained,
    EntityEmpty,
}


/// Remove empty containers on the way from `touched` up to the entity root.
///
/// Missing nodes along the way are skipped, so pruning after a removal
/// starts at the first ancestor that still exists. Running it twice has no
/// further effect.
pub fn prune(entity: &mut Node, touched: &NodePath) -> StoreResult<PruneOutcome> {
    for ancestor in touched.ancestors() {
        let empty = match entity.get(&ancestor)? {
            None => continue,
            Some(node) => !node.has_content(),
        };
        if !empty {
            break;
        }
        entity.remove(&ancestor)?;
        debug!(path = %ancestor, "pruned empty container");
    }

    if entity.has_content() {
        Ok(PruneOutcome::Retained)
    } else {
        Ok(PruneOutcome::EntityEmpty)
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> NodePath {
        NodePath::parse(s).unwrap()
    }

    #[test]
    fn empty_list_and_context_are_removed() {
        let mut entity = Node::empty_map();
        entity.insert(&p("permissions"), Node::list(["a"])).unwrap();
        entity.insert(&p("contexts/nether/permissions"), Node::list(Vec::<String>::new())).unwrap();

        let outcome = prune(&mut entity, &p("contexts/nether/permissions")).unwrap();
        assert_eq!(outcome, PruneOutcome::Retained);
        assert_eq!(entity.get(&p("contexts")).unwrap(), None);
        assert!(entity.get(&p("permissions")).unwrap().is_some());
    }

    #[test]
    fn sibling_context_keeps_contexts_map() {
        let mut entity = Node::empty_map();
        entity.insert(&p("contexts/nether/permissions"), Node::list([""])).unwrap();
        entity.insert(&p("contexts/end/options/prefix"), Node::leaf("x")).unwrap();

        prune(&mut entity, &p("contexts/nether/permissions")).unwrap();
        assert_eq!(entity.get(&p("contexts/nether")).unwrap(), None);
        assert!(entity.get(&p("contexts/end/options/prefix")).unwrap().is_some());
    }

    #[test]
    fn removed_option_prunes_options_map() {
        let mut entity = Node::empty_map();
        entity.insert(&p("contexts/world1/options/foo"), Node::leaf("bar")).unwrap();
        entity.insert(&p("contexts/world1/permissions"), Node::list(["a"])).unwrap();
        entity.remove(&p("contexts/world1/options/foo")).unwrap();

        let outcome = prune(&mut entity, &p("contexts/world1/options/foo")).unwrap();
        assert_eq!(outcome, PruneOutcome::Retained);
        assert_eq!(entity.get(&p("contexts/world1/options")).unwrap(), None);
        assert!(entity.get(&p("contexts/world1/permissions")).unwrap().is_some());
    }

    #[test]
    fn last_attribute_reports_entity_empty() {
        let mut entity = Node::empty_map();
        entity.insert(&p("parents"), Node::list(["", "  "])).unwrap();
        let outcome = prune(&mut entity, &p("parents")).unwrap();
        assert_eq!(outcome, PruneOutcome::EntityEmpty);
        assert_eq!(entity, Node::empty_map());
    }

    #[test]
    fn name_option_counts_as_content() {
        let mut entity = Node::empty_map();
        entity.insert(&p("options/name"), Node::leaf("u1")).unwrap();
        let outcome = prune(&mut entity, &p("permissions")).unwrap();
        assert_eq!(outcome, PruneOutcome::Retained);
        assert!(entity.get(&p("options/name")).unwrap().is_some());
    }

    #[test]
    fn nested_empty_maps_are_not_content() {
        let mut entity = Node::empty_map();
        entity.insert(&p("options/deep/er"), Node::empty_map()).unwrap();
        let outcome = prune(&mut entity, &p("options/deep/er")).unwrap();
        assert_eq!(outcome, PruneOutcome::EntityEmpty);
    }

    #[test]
    fn prune_is_idempotent() {
        let mut entity = Node::empty_map();
        entity.insert(&p("contexts/a/permissions"), Node::list(Vec::<String>::new())).unwrap();
        entity.insert(&p("options/x"), Node::leaf("1")).unwrap();
        prune(&mut entity, &p("contexts/a/permissions")).unwrap();
        let once = entity.clone();
        prune(&mut entity, &p("contexts/a/permissions")).unwrap();
        assert_eq!(entity, once);
    }

    #[test]
    fn malformed_ancestor_is_an_error() {
        let mut entity = Node::empty_map();
        entity.insert(&p("contexts"), Node::leaf("oops")).unwrap();
        assert!(prune(&mut entity, &p("contexts/a/permissions")).is_err());
    }
}
