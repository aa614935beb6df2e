//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (PRIVATE_KEY, SEPOLIA_RPC_URL, contract addresses)
//!     → wallet.rs (key loading, signing)
//!     → client.rs (RPC connection with timeouts and failover)
//!     → transaction.rs (build, sign, broadcast, confirm)
//!     → contracts.rs (TaskManager / MomToken ABI)
//!     → ledger.rs (TaskLedger trait, EVM implementation)
//!     → memory.rs (in-process ledger with the contract's rules)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when blockchain unreachable

pub mod client;
pub mod contracts;
pub mod ledger;
pub mod memory;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::BlockchainClient;
pub use ledger::{EvmTaskLedger, TaskLedger};
pub use memory::{LedgerEvent, MemoryLedger};
pub use transaction::TxBuilder;
pub use types::{BlockchainConfig, BlockchainError, BlockchainResult, OnChainTask, ReceiptLog, ReceiptSummary, TxOutcome};
pub use wallet::Wallet;
