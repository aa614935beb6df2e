//! Task-hash ledger abstraction and its EVM implementation.
//!
//! The ledger is the on-chain side of verification: a record per task hash
//! with an existence flag, a completion flag and a creation timestamp.

use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, B256};
use alloy::rpc::types::{Filter, TransactionRequest};
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::contracts::TaskManager;
use crate::blockchain::transaction::TxBuilder;
use crate::blockchain::types::{
    BlockchainError, BlockchainResult, OnChainTask, ReceiptSummary, TxOutcome,
};
use crate::blockchain::wallet::Wallet;
use crate::observability::metrics;

/// Read/write access to the task-hash ledger.
#[async_trait]
pub trait TaskLedger: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Address of the ledger contract.
    fn contract(&self) -> Address;

    /// Address writes are sent from, when this ledger can write.
    fn signer(&self) -> Option<Address>;

    /// `getTaskStatus(hash)`.
    async fn task_status(&self, hash: B256) -> BlockchainResult<OnChainTask>;

    /// `createTask(hash)` sent by the signer.
    async fn create_task(&self, hash: B256) -> BlockchainResult<TxOutcome>;

    /// `completeTask(hash)` sent by the signer.
    async fn complete_task(&self, hash: B256) -> BlockchainResult<TxOutcome>;

    /// Wallet that recorded `hash`, from its `TaskCreated` event.
    async fn record_owner(&self, hash: B256) -> BlockchainResult<Option<Address>>;

    /// Receipt for a transaction, `None` while pending or unknown.
    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>>;

    /// Whether the ledger backend is reachable.
    async fn is_healthy(&self) -> bool;
}

/// `TaskManager` contract reached over JSON-RPC.
pub struct EvmTaskLedger {
    client: BlockchainClient,
    contract: Address,
    sender: Option<TxBuilder>,
    confirmation_timeout_secs: u64,
}

impl EvmTaskLedger {
    /// Create a ledger client. Without a wallet the ledger is read-only.
    pub fn new(client: BlockchainClient, contract: Address, wallet: Option<Wallet>) -> Self {
        let confirmation_timeout_secs = client.config().confirmation_timeout_secs;
        let sender = wallet.map(|w| TxBuilder::new(client.clone(), w));
        if sender.is_none() {
            tracing::warn!(contract = %contract, "Task ledger is read-only: no signer configured");
        }
        Self {
            client,
            contract,
            sender,
            confirmation_timeout_secs,
        }
    }

    async fn read<C: SolCall>(&self, method: &'static str, call: C) -> BlockchainResult<C::Return> {
        let tx = TransactionRequest::default()
            .with_to(self.contract)
            .with_input(Bytes::from(call.abi_encode()));
        let result = self.client.call(tx).await;
        metrics::record_ledger_call(method, result.is_ok());
        let data = result?;
        C::abi_decode_returns(&data).map_err(|e| BlockchainError::Decode(e.to_string()))
    }

    async fn write<C: SolCall>(&self, method: &'static str, call: C) -> BlockchainResult<TxOutcome> {
        let sender = self.sender.as_ref().ok_or_else(|| {
            BlockchainError::NotAvailable("no signer configured for ledger writes".to_string())
        })?;
        let result = sender
            .send_and_confirm(
                self.contract,
                Bytes::from(call.abi_encode()),
                self.confirmation_timeout_secs,
            )
            .await;
        metrics::record_ledger_call(method, result.is_ok());
        result
    }
}

#[async_trait]
impl TaskLedger for EvmTaskLedger {
    fn name(&self) -> &'static str {
        "evm"
    }

    fn contract(&self) -> Address {
        self.contract
    }

    fn signer(&self) -> Option<Address> {
        self.sender.as_ref().map(TxBuilder::address)
    }

    async fn task_status(&self, hash: B256) -> BlockchainResult<OnChainTask> {
        let status = self
            .read("getTaskStatus", TaskManager::getTaskStatusCall { taskHash: hash })
            .await?;
        Ok(OnChainTask {
            exists: status.exists,
            completed: status.completed,
            hash: status.hash,
            timestamp: status.timestamp.saturating_to::<u64>(),
        })
    }

    async fn create_task(&self, hash: B256) -> BlockchainResult<TxOutcome> {
        self.write("createTask", TaskManager::createTaskCall { taskHash: hash })
            .await
    }

    async fn complete_task(&self, hash: B256) -> BlockchainResult<TxOutcome> {
        self.write("completeTask", TaskManager::completeTaskCall { taskHash: hash })
            .await
    }

    async fn record_owner(&self, hash: B256) -> BlockchainResult<Option<Address>> {
        let filter = Filter::new()
            .address(self.contract)
            .event_signature(TaskManager::TaskCreated::SIGNATURE_HASH)
            .topic1(hash)
            .from_block(BlockNumberOrTag::Earliest);
        let result = self.client.get_logs(filter).await;
        metrics::record_ledger_call("getLogs", result.is_ok());
        Ok(result?
            .iter()
            .find_map(|log| log.topics().get(2).map(|owner| Address::from_word(*owner))))
    }

    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        let result = self.client.receipt_summary(tx_hash).await;
        metrics::record_ledger_call("getTransactionReceipt", result.is_ok());
        result
    }

    async fn is_healthy(&self) -> bool {
        self.client.is_healthy().await
    }
}
