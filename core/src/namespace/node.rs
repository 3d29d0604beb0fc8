//! The document tree.
//!
//! Every backing store is seen as a tree of `Node`s: a leaf string, a list
//! of leaf strings, or a map of named children. Traversal returns
//! `MalformedDocument` when an intermediate node is not a map instead of
//! guessing at the shape.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::Value as YamlValue;

use super::path::NodePath;
use crate::error::{StoreError, StoreResult};


/// Children of a map node, keyed by name.
pub type NodeMap = BTreeMap<String, Node>;


/// A node in a namespace document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Leaf(String),
    List(Vec<String>),
    Map(NodeMap),
}

impl Node {
    pub fn empty_map() -> Node {
        Node::Map(NodeMap::new())
    }

    pub fn leaf(value: impl Into<String>) -> Node {
        Node::Leaf(value.into())
    }

    pub fn list<I, S>(items: I) -> Node
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Node::List(items.into_iter().map(Into::into).collect())
    }

    /// Human-readable name of the variant, used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Node::Leaf(_) => "a leaf value",
            Node::List(_) => "a list",
            Node::Map(_) => "a map",
        }
    }

    pub fn as_map(&self) -> Option<&NodeMap> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut NodeMap> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    /// True if this node holds content anywhere beneath it: a non-empty
    /// leaf value or a non-blank list entry. Maps and lists never count as
    /// content by themselves.
    pub fn has_content(&self) -> bool {
        match self {
            Node::Leaf(v) => !v.is_empty(),
            Node::List(items) => items.iter().any(|v| !is_blank(v)),
            Node::Map(children) => children.values().any(Node::has_content),
        }
    }

    /// Look up the node at `path`.
    ///
    /// Returns `Ok(None)` if any segment is missing and an error if an
    /// intermediate node is not a map.
    pub fn get(&self, path: &NodePath) -> StoreResult<Option<&Node>> {
        let mut current = self;
        for (depth, segment) in path.segments().iter().enumerate() {
            let map = current
                .as_map()
                .ok_or_else(|| malformed_prefix(path, depth, "a map"))?;
            match map.get(segment) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Mutable map at `path`, creating empty maps for missing segments.
    pub fn ensure_map(&mut self, path: &NodePath) -> StoreResult<&mut NodeMap> {
        let mut current = self;
        for (depth, segment) in path.segments().iter().enumerate() {
            let map = current
                .as_map_mut()
                .ok_or_else(|| malformed_prefix(path, depth, "a map"))?;
            current = map.entry(segment.clone()).or_insert_with(Node::empty_map);
        }
        current
            .as_map_mut()
            .ok_or_else(|| StoreError::malformed(path.to_slashed(), "a map"))
    }

    /// Store `node` at `path`, creating intermediate maps as needed.
    ///
    /// Setting the root path replaces this node.
    pub fn insert(&mut self, path: &NodePath, node: Node) -> StoreResult<()> {
        match (path.parent(), path.last()) {
            (Some(parent), Some(key)) => {
                let key = key.to_string();
                self.ensure_map(&parent)?.insert(key, node);
            }
            _ => *self = node,
        }
        Ok(())
    }

    /// Remove and return the node at `path`. Missing intermediate
    /// segments are not created.
    pub fn remove(&mut self, path: &NodePath) -> StoreResult<Option<Node>> {
        let (parent, key) = match (path.parent(), path.last()) {
            (Some(parent), Some(key)) => (parent, key.to_string()),
            _ => return Ok(None),
        };
        let mut current = self;
        for (depth, segment) in parent.segments().iter().enumerate() {
            let map = current
                .as_map_mut()
                .ok_or_else(|| malformed_prefix(path, depth, "a map"))?;
            match map.get_mut(segment) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        let map = current
            .as_map_mut()
            .ok_or_else(|| StoreError::malformed(parent.to_slashed(), "a map"))?;
        Ok(map.remove(&key))
    }

    /// Convert a YAML value into a node. Nulls yield `None` and are dropped
    /// from enclosing maps and lists; scalars are stringified.
    pub fn from_yaml(value: &YamlValue) -> Option<Node> {
        match value {
            YamlValue::Null => None,
            YamlValue::Sequence(items) => Some(Node::List(
                items.iter().filter_map(yaml_scalar).collect(),
            )),
            YamlValue::Mapping(mapping) => {
                let mut children = NodeMap::new();
                for (key, child) in mapping {
                    let Some(key) = yaml_scalar(key) else {
                        continue;
                    };
                    if let Some(node) = Node::from_yaml(child) {
                        children.insert(key, node);
                    }
                }
                Some(Node::Map(children))
            }
            YamlValue::Tagged(tagged) => Node::from_yaml(&tagged.value),
            scalar => yaml_scalar(scalar).map(Node::Leaf),
        }
    }

    /// Convert this node into a YAML value.
    pub fn to_yaml(&self) -> YamlValue {
        match self {
            Node::Leaf(v) => YamlValue::String(v.clone()),
            Node::List(items) => YamlValue::Sequence(
                items.iter().cloned().map(YamlValue::String).collect(),
            ),
            Node::Map(children) => map_to_yaml(children),
        }
    }
}


/// Convert a map of children into a YAML mapping without cloning it into a
/// `Node` first.
pub fn map_to_yaml(children: &NodeMap) -> YamlValue {
    let mut mapping = serde_yaml::Mapping::new();
    for (key, child) in children {
        mapping.insert(YamlValue::String(key.clone()), child.to_yaml());
    }
    YamlValue::Mapping(mapping)
}


/// A string that holds nothing but whitespace.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}


fn yaml_scalar(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Tagged(tagged) => yaml_scalar(&tagged.value),
        _ => None,
    }
}


fn malformed_prefix(path: &NodePath, depth: usize, expected: &'static str) -> StoreError {
    let prefix = NodePath::new(path.segments()[..depth].iter().cloned());
    let shown = if prefix.is_root() { "<root>".to_string() } else { prefix.to_slashed() };
    StoreError::malformed(shown, expected)
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
