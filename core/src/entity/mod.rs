//! Entities: context overlay, identity resolution, pruning and the
//! record API built on them.

pub mod overlay;
pub mod identity;
pub mod prune;
pub mod record;

pub use overlay::{normalize_context, AttributeKind, ContextOverlay};
pub use prune::{prune, PruneOutcome};
pub use record::{ContextMap, EntityRecord};
