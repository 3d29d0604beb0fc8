//! Slash-joined path building for the document tree.
//!
//! Paths like `users/steve/contexts/world/permissions` are kept as a list
//! of owned segments so that a segment may itself contain `.` or `/`
//! (option keys do). The slash-joined form is only used for display,
//! error messages and parsing user input.

use std::fmt;


/// Separator used when a path is rendered or parsed.
pub const SEPARATOR: char = '/';


/// A path into the document tree, relative to whatever node it is applied to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// The empty path, addressing the node it is applied to.
    pub fn root() -> Self {
        NodePath { segments: Vec::new() }
    }

    /// Build a path from segments. Empty segments are skipped.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = segments
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty())
            .collect();
        NodePath { segments }
    }

    /// Parse a slash-joined string like `contexts/world/options`.
    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim().trim_matches(SEPARATOR);
        if input.is_empty() {
            return Ok(NodePath::root());
        }
        let mut segments = Vec::new();
        for part in input.split(SEPARATOR) {
            if part.is_empty() {
                return Err(format!("empty segment in path '{}'", input));
            }
            segments.push(part.to_string());
        }
        Ok(NodePath { segments })
    }

    /// A new path with `segment` appended. An empty segment leaves the
    /// path unchanged.
    pub fn child(&self, segment: impl Into<String>) -> NodePath {
        let mut out = self.clone();
        let segment = segment.into();
        if !segment.is_empty() {
            out.segments.push(segment);
        }
        out
    }

    /// The path without its last segment, or `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.segments.is_empty() {
            return None;
        }
        let mut out = self.clone();
        out.segments.pop();
        Some(out)
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Every non-root prefix of this path, longest first.
    ///
    /// `a/b/c` yields `a/b/c`, `a/b`, `a`.
    pub fn ancestors(&self) -> impl Iterator<Item = NodePath> + '_ {
        (1..=self.segments.len())
            .rev()
            .map(move |n| NodePath { segments: self.segments[..n].to_vec() })
    }

    /// Format as a slash-joined string.
    pub fn to_slashed(&self) -> String {
        self.segments.join(&SEPARATOR.to_string())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_slashed())
    }
}


/// Path of an entity within its namespace, e.g. `users/steve`.
pub fn entity_path(base_path: &str, name: &str) -> NodePath {
    NodePath::new([base_path, name])
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
