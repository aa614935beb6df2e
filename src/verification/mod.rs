//! Verification core: reconciling task hashes with the on-chain ledger.
//!
//! # Data Flow
//! ```text
//! POST /api/tasks/{id}/verify
//!     → verifier.rs (owner-scoped load, expected hash, mode selection)
//!         client mode: receipt (success, sender == owner) + ledger status
//!         relay mode:  createTask / completeTask with retries
//!     → store (completed, verified, txHash, taskHash)
//!     → rewards (MOM transfer + off-chain credit)
//!
//! reconciler.rs (interval)
//!     → completed ∧ ¬verified tasks → ledger status → store
//! ```
//!
//! # Design Decisions
//! - Chain first, store second; the reconciler converges the gap
//! - One verification per task hash at a time

pub mod reconciler;
pub mod verifier;

pub use reconciler::Reconciler;
pub use verifier::{ChainStatus, VerificationMode, Verifier, VerifyOutcome, VerifyRequest};
