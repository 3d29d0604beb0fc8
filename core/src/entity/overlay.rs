//! Maps `(context, attribute kind)` to a subtree path
//! inside an entity.
//!
//! The common context lives directly under the entity
//! (`permissions`, `options/<key>`, `parents`); a named context lives under
//! `<contexts_key>/<context>/…`.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::StoreResult;
use crate::namespace::{Node, NodePath};


/// Attribute containers an entity can hold per context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Permissions,
    Options,
    Parents,
}

impl AttributeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Permissions => "permissions",
            AttributeKind::Options => "options",
            AttributeKind::Parents => "parents",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// Treat `None`, `""` and whitespace-only names as the common context.
pub fn normalize_context(context: Option<&str>) -> Option<&str> {
    context.map(str::trim).filter(|c| !c.is_empty())
}


/// Key layout of entity subtrees in one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOverlay {
    contexts_key: String,
    parents_key: String,
}

impl ContextOverlay {
    pub fn new(contexts_key: impl Into<String>, parents_key: impl Into<String>) -> Self {
        ContextOverlay {
            contexts_key: contexts_key.into(),
            parents_key: parents_key.into(),
        }
    }

    pub fn contexts_key(&self) -> &str {
        &self.contexts_key
    }

    pub fn parents_key(&self) -> &str {
        &self.parents_key
    }

    fn key_for(&self, kind: AttributeKind) -> &str {
        match kind {
            AttributeKind::Parents => &self.parents_key,
            other => other.as_str(),
        }
    }

    /// Root of the attribute sets of `context`: the entity itself for the
    /// common context.
    pub fn context_root(&self, context: Option<&str>) -> NodePath {
        match normalize_context(context) {
            None => NodePath::root(),
            Some(name) => NodePath::new([self.contexts_key.as_str(), name]),
        }
    }

    /// Path of an attribute container.
    pub fn path(&self, context: Option<&str>, kind: AttributeKind) -> NodePath {
        self.context_root(context).child(self.key_for(kind))
    }

    /// Path of a single option value. The key is one segment even if it
    /// contains dots or slashes.
    pub fn option_path(&self, context: Option<&str>, key: &str) -> NodePath {
        self.path(context, AttributeKind::Options).child(key)
    }

    /// Names of the contexts an entity has attribute sets for.
    pub fn contexts(&self, entity: &Node) -> StoreResult<BTreeSet<String>> {
        let path = NodePath::new([self.contexts_key.as_str()]);
        match entity.get(&path)? {
            Some(Node::Map(children)) => Ok(children.keys().cloned().collect()),
            Some(_) => Err(crate::error::StoreError::malformed(path.to_slashed(), "a map")),
            None => Ok(BTreeSet::new()),
        }
    }
}

impl Default for ContextOverlay {
    fn default() -> Self {
        ContextOverlay::new("contexts", "parents")
    }
}
