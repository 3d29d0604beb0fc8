//! Flush outcome reporting.
//!
//! A flush pushes a namespace's in-memory tree to its `PersistenceGateway`.
//! The in-memory tree is authoritative: a failed flush is logged and handed
//! back to the caller, but the mutation that preceded it stays applied and
//! the namespace stays dirty until a later flush succeeds.

use crate::error::StoreError;


/// Outcome of pushing a namespace to its gateway.
#[derive(Debug)]
#[must_use = "a failed flush leaves the change in memory only"]
pub enum FlushStatus {
    /// The gateway accepted the document.
    Flushed,
    /// The gateway failed; the in-memory change was kept.
    Failed(StoreError),
}

impl FlushStatus {
    pub fn is_flushed(&self) -> bool {
        matches!(self, FlushStatus::Flushed)
    }

    /// The gateway error, if the flush failed.
    pub fn error(&self) -> Option<&StoreError> {
        match self {
            FlushStatus::Flushed => None,
            FlushStatus::Failed(e) => Some(e),
        }
    }

    /// Convert into a `Result`, for callers that treat a failed flush as fatal.
    pub fn into_result(self) -> Result<(), StoreError> {
        match self {
            FlushStatus::Flushed => Ok(()),
            FlushStatus::Failed(e) => Err(e),
        }
    }
}
