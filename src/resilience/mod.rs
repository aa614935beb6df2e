//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Ledger write during relay verification:
//!     → retries.rs (re-run while the error is transient)
//!     → backoff.rs (exponential delay with jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - Timeouts live with the clients that make the calls (RPC, advisor)
//! - Retries only for transient failures; reverts are final
//! - Ledger writes are made idempotent by the caller before being retried

pub mod backoff;
pub mod retries;

pub use retries::{retry_with_backoff, RetryPolicy};
