//! In-process task ledger.
//!
//! Enforces the same rules as the `TaskManager` contract so the service can
//! run (and be tested) without a chain. Used when blockchain integration is
//! disabled.

use alloy::primitives::{address, keccak256, Address, TxHash, B256};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::blockchain::contracts::{reverts, TaskManager};
use crate::blockchain::ledger::TaskLedger;
use crate::blockchain::types::{
    BlockchainError, BlockchainResult, OnChainTask, ReceiptLog, ReceiptSummary, TxOutcome,
};

/// Pseudo contract address reported by the in-memory ledger.
pub const MEMORY_LEDGER_ADDRESS: Address = address!("0x00000000000000000000000000000000000a11ce");

/// Events the contract would emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    TaskCreated { task_hash: B256, owner: Address },
    TaskCompleted { task_hash: B256 },
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    owner: Address,
    completed: bool,
    timestamp: u64,
}

/// Ledger held in process memory.
pub struct MemoryLedger {
    signer: Address,
    tasks: DashMap<B256, LedgerEntry>,
    receipts: DashMap<TxHash, ReceiptSummary>,
    events: Mutex<Vec<LedgerEvent>>,
    block: AtomicU64,
    transient_failures: AtomicU32,
}

impl MemoryLedger {
    /// Create an empty ledger whose trait-level writes are sent by `signer`.
    pub fn new(signer: Address) -> Self {
        Self {
            signer,
            tasks: DashMap::new(),
            receipts: DashMap::new(),
            events: Mutex::new(Vec::new()),
            block: AtomicU64::new(1),
            transient_failures: AtomicU32::new(0),
        }
    }

    /// Make the next `count` trait-level writes fail with a transport error.
    pub fn inject_transient_failures(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    fn take_transient_failure(&self) -> bool {
        self.transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn mine(&self, from: Address, salt: B256, success: bool, logs: Vec<ReceiptLog>) -> TxOutcome {
        let block_number = self.block.fetch_add(1, Ordering::SeqCst);
        let mut preimage = Vec::with_capacity(72);
        preimage.extend_from_slice(&block_number.to_be_bytes());
        preimage.extend_from_slice(from.as_slice());
        preimage.extend_from_slice(salt.as_slice());
        let tx_hash = keccak256(&preimage);

        self.receipts.insert(
            tx_hash,
            ReceiptSummary {
                tx_hash,
                from,
                to: Some(MEMORY_LEDGER_ADDRESS),
                success,
                block_number: Some(block_number),
                logs,
            },
        );
        TxOutcome { tx_hash, block_number }
    }

    fn emit(&self, event: LedgerEvent) {
        self.events.lock().expect("ledger event mutex poisoned").push(event);
    }

    /// `createTask(hash)` sent by `sender`.
    pub fn create_task_as(&self, sender: Address, hash: B256) -> BlockchainResult<TxOutcome> {
        match self.tasks.entry(hash) {
            Entry::Occupied(_) => Err(BlockchainError::Reverted(reverts::TASK_EXISTS.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(LedgerEntry {
                    owner: sender,
                    completed: false,
                    timestamp: chrono::Utc::now().timestamp().max(0) as u64,
                });
                self.emit(LedgerEvent::TaskCreated { task_hash: hash, owner: sender });
                let log = ReceiptLog {
                    address: MEMORY_LEDGER_ADDRESS,
                    topics: vec![
                        TaskManager::TaskCreated::SIGNATURE_HASH,
                        hash,
                        sender.into_word(),
                    ],
                };
                Ok(self.mine(sender, hash, true, vec![log]))
            }
        }
    }

    /// `completeTask(hash)` sent by `sender`.
    pub fn complete_task_as(&self, sender: Address, hash: B256) -> BlockchainResult<TxOutcome> {
        {
            let mut entry = self
                .tasks
                .get_mut(&hash)
                .ok_or_else(|| BlockchainError::Reverted(reverts::TASK_MISSING.to_string()))?;
            if entry.owner != sender {
                return Err(BlockchainError::Reverted(reverts::NOT_OWNER.to_string()));
            }
            if entry.completed {
                return Err(BlockchainError::Reverted(reverts::TASK_COMPLETED.to_string()));
            }
            entry.completed = true;
        }
        self.emit(LedgerEvent::TaskCompleted { task_hash: hash });
        let log = ReceiptLog {
            address: MEMORY_LEDGER_ADDRESS,
            topics: vec![TaskManager::TaskCompleted::SIGNATURE_HASH, hash],
        };
        Ok(self.mine(sender, hash, true, vec![log]))
    }

    /// Record a mined-but-reverted transaction from `sender`.
    pub fn record_reverted_tx(&self, sender: Address) -> TxHash {
        self.mine(sender, B256::ZERO, false, Vec::new()).tx_hash
    }

    /// `verifyTask(hash)`: whether the hash has been recorded.
    pub fn verify_task(&self, hash: B256) -> bool {
        self.tasks.contains_key(&hash)
    }

    /// `isTaskCompleted(hash)`.
    pub fn is_task_completed(&self, hash: B256) -> bool {
        self.tasks.get(&hash).map(|e| e.completed).unwrap_or(false)
    }

    /// Owner of a recorded hash.
    pub fn owner_of(&self, hash: B256) -> Option<Address> {
        self.tasks.get(&hash).map(|e| e.owner)
    }

    /// Events emitted so far, oldest first.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().expect("ledger event mutex poisoned").clone()
    }
}

#[async_trait]
impl TaskLedger for MemoryLedger {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn contract(&self) -> Address {
        MEMORY_LEDGER_ADDRESS
    }

    fn signer(&self) -> Option<Address> {
        Some(self.signer)
    }

    async fn task_status(&self, hash: B256) -> BlockchainResult<OnChainTask> {
        Ok(self
            .tasks
            .get(&hash)
            .map(|e| OnChainTask {
                exists: true,
                completed: e.completed,
                hash,
                timestamp: e.timestamp,
            })
            .unwrap_or_else(OnChainTask::missing))
    }

    async fn create_task(&self, hash: B256) -> BlockchainResult<TxOutcome> {
        if self.take_transient_failure() {
            return Err(BlockchainError::Rpc("injected transport failure".to_string()));
        }
        self.create_task_as(self.signer, hash)
    }

    async fn complete_task(&self, hash: B256) -> BlockchainResult<TxOutcome> {
        if self.take_transient_failure() {
            return Err(BlockchainError::Rpc("injected transport failure".to_string()));
        }
        self.complete_task_as(self.signer, hash)
    }

    async fn record_owner(&self, hash: B256) -> BlockchainResult<Option<Address>> {
        Ok(self.owner_of(hash))
    }

    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        Ok(self.receipts.get(&tx_hash).map(|r| r.value().clone()))
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
