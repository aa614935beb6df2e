//! Task and user persistence.
//!
//! # Design Decisions
//! - Records live in concurrent maps; reads never block writers of other keys
//! - A secondary index on `taskHash` makes duplicate detection atomic across
//!   owners; hashes of verified tasks stay claimed after deletion
//! - When a snapshot path is configured, mutations mark the state dirty and a
//!   background flusher rewrites the JSON file on the blocking pool

pub mod store;

pub use store::Store;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is not valid JSON: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Task with this hash already exists")]
    DuplicateHash,

    #[error("Task hash was already verified")]
    SpentHash,
}

pub type StoreResult<T> = Result<T, StoreError>;
