//! Chain-specific types and error definitions.

use alloy::primitives::{Address, TxHash, B256};
use alloy::sol_types::SolEvent;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::contracts::TaskManager;

// Re-export BlockchainConfig from config module to avoid duplication
pub use crate::config::schema::BlockchainConfig;

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Transaction was not confirmed within expected time.
    #[error("Transaction not confirmed after {0} blocks")]
    ConfirmationTimeout(u32),

    /// Transaction or call was reverted by the contract.
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// Return data could not be decoded against the contract ABI.
    #[error("ABI decode error: {0}")]
    Decode(String),

    /// Invalid private key format or derivation error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Blockchain client not initialized or disabled.
    #[error("Blockchain not available: {0}")]
    NotAvailable(String),
}

impl BlockchainError {
    /// Whether retrying the same call could succeed.
    ///
    /// Reverts are deterministic for a given chain state; transport failures
    /// and timeouts are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BlockchainError::Rpc(_)
                | BlockchainError::Timeout(_)
                | BlockchainError::ConfirmationTimeout(_)
                | BlockchainError::GasPriceTooHigh { .. }
        )
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// On-chain record of a task, as reported by `getTaskStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnChainTask {
    pub exists: bool,
    pub completed: bool,
    pub hash: B256,
    /// Block timestamp of creation (seconds since epoch), 0 when absent.
    pub timestamp: u64,
}

impl OnChainTask {
    /// The record returned for a hash the contract has never seen.
    pub fn missing() -> Self {
        Self {
            exists: false,
            completed: false,
            hash: B256::ZERO,
            timestamp: 0,
        }
    }
}

/// Outcome of a confirmed ledger write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutcome {
    pub tx_hash: TxHash,
    pub block_number: u64,
}

/// A log entry of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
}

/// The parts of a transaction receipt verification cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: TxHash,
    pub from: Address,
    pub to: Option<Address>,
    pub success: bool,
    pub block_number: Option<u64>,
    pub logs: Vec<ReceiptLog>,
}

impl ReceiptSummary {
    /// Whether `contract` emitted `TaskCompleted(task_hash)` in this transaction.
    pub fn completes(&self, contract: Address, task_hash: B256) -> bool {
        self.logs.iter().any(|log| {
            log.address == contract
                && log.topics.first() == Some(&TaskManager::TaskCompleted::SIGNATURE_HASH)
                && log.topics.get(1) == Some(&task_hash)
        })
    }
}
