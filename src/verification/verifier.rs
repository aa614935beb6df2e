//! Task verification against the on-chain ledger.
//!
//! Two modes:
//! - client-submitted: the owner's wallet already sent `completeTask`; the
//!   receipt and ledger state are checked
//! - relay: the server wallet creates and completes the record itself
//!
//! Chain state is settled before the store is written, so a crash between
//! the two leaves a completed on-chain record that the reconciler picks up.

use alloy::primitives::{Address, TxHash, B256};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::blockchain::contracts::reverts;
use crate::blockchain::{BlockchainError, BlockchainResult, OnChainTask, TaskLedger, TxOutcome};
use crate::config::VerificationConfig;
use crate::error::{AppError, AppResult};
use crate::observability::metrics;
use crate::resilience::{retry_with_backoff, RetryPolicy};
use crate::rewards::{RewardReceipt, RewardService};
use crate::storage::Store;
use crate::tasks::hash::task_hash_of;
use crate::tasks::model::{Task, TaskStatus};

/// Body of `POST /api/tasks/{id}/verify`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub task_hash: Option<B256>,
    #[serde(default)]
    pub tx_hash: Option<TxHash>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    Client,
    Relay,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub task: Task,
    pub mode: VerificationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<RewardReceipt>,
}

/// On-chain view of a task.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub task_id: String,
    pub task_hash: B256,
    pub on_chain: OnChainTask,
    /// Whether the record exists, is completed and carries the same hash.
    pub matches: bool,
}

/// Hashes currently being verified, shared with the reconciler.
pub type InFlightHashes = Arc<DashMap<B256, ()>>;

/// Claim on a hash in the in-flight set, released when dropped.
pub(crate) struct InFlight<'a> {
    set: &'a DashMap<B256, ()>,
    hash: B256,
}

impl<'a> InFlight<'a> {
    /// Claim `hash`, or `None` when someone else holds it.
    pub(crate) fn claim(set: &'a DashMap<B256, ()>, hash: B256) -> Option<Self> {
        if set.insert(hash, ()).is_some() {
            return None;
        }
        Some(Self { set, hash })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.hash);
    }
}

pub struct Verifier {
    store: Arc<Store>,
    ledger: Arc<dyn TaskLedger>,
    rewards: Arc<RewardService>,
    relay_enabled: bool,
    retry: RetryPolicy,
    in_flight: InFlightHashes,
}

impl Verifier {
    pub fn new(
        store: Arc<Store>,
        ledger: Arc<dyn TaskLedger>,
        rewards: Arc<RewardService>,
        config: &VerificationConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            rewards,
            relay_enabled: config.relay_enabled,
            retry: RetryPolicy::from_config(config),
            in_flight: InFlightHashes::default(),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn TaskLedger> {
        &self.ledger
    }

    /// The in-flight set, for other writers of the verified flag.
    pub fn in_flight(&self) -> InFlightHashes {
        Arc::clone(&self.in_flight)
    }

    /// Verify a task of `owner` and pay its reward.
    pub async fn verify(
        &self,
        owner: Address,
        task_id: &str,
        request: VerifyRequest,
    ) -> AppResult<VerifyOutcome> {
        let result = self.verify_inner(owner, task_id, request).await;
        match &result {
            Ok(outcome) => metrics::record_verification(match outcome.mode {
                VerificationMode::Client => "verified_client",
                VerificationMode::Relay => "verified_relay",
            }),
            Err(AppError::Conflict(_)) => metrics::record_verification("rejected"),
            Err(_) => metrics::record_verification("error"),
        }
        result
    }

    async fn verify_inner(
        &self,
        owner: Address,
        task_id: &str,
        request: VerifyRequest,
    ) -> AppResult<VerifyOutcome> {
        let task = self
            .store
            .get_task(&owner, task_id)
            .ok_or(AppError::NotFound("Task"))?;
        if task.verified {
            return Err(AppError::Conflict("Task is already verified".to_string()));
        }

        let expected = match task.task_hash {
            Some(hash) => hash,
            None => task_hash_of(&task)?,
        };
        if let Some(claimed) = request.task_hash {
            if claimed != expected {
                tracing::warn!(
                    task_id = %task_id,
                    expected = %expected,
                    claimed = %claimed,
                    "Task hash mismatch"
                );
                return Err(AppError::Conflict("Task hash does not match".to_string()));
            }
        }

        if self.store.is_spent(&expected) {
            return Err(AppError::Conflict("Task hash was already verified".to_string()));
        }

        let Some(_guard) = InFlight::claim(&self.in_flight, expected) else {
            return Err(AppError::Conflict("Verification already in progress".to_string()));
        };

        let (mode, tx_hash) = match request.tx_hash {
            Some(tx_hash) => {
                self.check_submitted(owner, expected, tx_hash).await?;
                (VerificationMode::Client, Some(tx_hash))
            }
            None => (VerificationMode::Relay, self.relay(owner, expected).await?),
        };

        let now = Utc::now();
        let task = self
            .store
            .modify_task(&owner, task_id, |t| -> AppResult<()> {
                if t.verified {
                    return Err(AppError::Conflict("Task is already verified".to_string()));
                }
                t.set_status(TaskStatus::Completed, now);
                t.verified = true;
                t.task_hash = Some(expected);
                if tx_hash.is_some() {
                    t.tx_hash = tx_hash;
                }
                Ok(())
            })?
            .ok_or(AppError::NotFound("Task"))?;

        tracing::info!(
            task_id = %task.id,
            owner = %owner,
            task_hash = %expected,
            mode = ?mode,
            "Task verified"
        );

        let reward = self.rewards.pay(owner, &task).await;
        Ok(VerifyOutcome { task, mode, reward })
    }

    /// Check a transaction the owner sent themselves.
    ///
    /// The receipt must be the owner's successful call to the ledger
    /// contract that emitted `TaskCompleted` for this very hash.
    async fn check_submitted(&self, owner: Address, expected: B256, tx_hash: TxHash) -> AppResult<()> {
        let contract = self.ledger.contract();
        let receipt = self
            .ledger
            .receipt(tx_hash)
            .await?
            .ok_or_else(|| AppError::Conflict("Transaction not found or still pending".to_string()))?;

        if !receipt.success {
            return Err(AppError::Conflict("Transaction failed on-chain".to_string()));
        }
        if receipt.from != owner {
            tracing::warn!(tx_hash = %tx_hash, sender = %receipt.from, owner = %owner, "Foreign transaction submitted");
            return Err(AppError::Conflict(
                "Transaction was not sent by the task owner".to_string(),
            ));
        }
        if receipt.to != Some(contract) {
            return Err(AppError::Conflict(
                "Transaction was not sent to the task contract".to_string(),
            ));
        }

        let status = self.ledger.task_status(expected).await?;
        if !status.exists {
            return Err(AppError::Conflict("Task hash is not recorded on-chain".to_string()));
        }
        if !status.completed {
            return Err(AppError::Conflict("Task is not completed on-chain".to_string()));
        }
        if status.hash != expected {
            return Err(AppError::Conflict("On-chain hash does not match".to_string()));
        }
        if !receipt.completes(contract, expected) {
            tracing::warn!(tx_hash = %tx_hash, task_hash = %expected, "Receipt completes a different task");
            return Err(AppError::Conflict(
                "Transaction did not complete this task".to_string(),
            ));
        }
        Ok(())
    }

    /// Record and complete the hash with the server wallet.
    ///
    /// Idempotent: steps already done on-chain are skipped, and a revert that
    /// says the step is already done counts as success. An existing record
    /// is only taken over when the server wallet created it. Returns the hash
    /// of the last transaction sent, if any.
    async fn relay(&self, owner: Address, expected: B256) -> AppResult<Option<TxHash>> {
        if !self.relay_enabled {
            return Err(AppError::Validation(
                "txHash is required when relay verification is disabled".to_string(),
            ));
        }
        let signer = self.ledger.signer().ok_or_else(|| {
            BlockchainError::NotAvailable("no server wallet configured for relay".to_string())
        })?;

        let ledger: &dyn TaskLedger = self.ledger.as_ref();
        let status = retry_with_backoff(
            &self.retry,
            "getTaskStatus",
            BlockchainError::is_transient,
            move || ledger.task_status(expected),
        )
        .await?;

        if status.exists {
            let recorded_by = retry_with_backoff(
                &self.retry,
                "getLogs",
                BlockchainError::is_transient,
                move || ledger.record_owner(expected),
            )
            .await?;
            if recorded_by != Some(signer) {
                tracing::warn!(
                    task_hash = %expected,
                    owner = %owner,
                    recorded_by = ?recorded_by,
                    "Relay refused for a record the server did not create"
                );
                return Err(AppError::Conflict(
                    "Task hash is recorded on-chain by another wallet; submit its txHash".to_string(),
                ));
            }
        }

        let mut last_tx = None;
        if !status.exists {
            let created = retry_with_backoff(
                &self.retry,
                "createTask",
                BlockchainError::is_transient,
                move || ledger.create_task(expected),
            )
            .await;
            last_tx = settled(created, reverts::TASK_EXISTS)?.or(last_tx);
            tracing::debug!(task_hash = %expected, signer = %signer, "Relay recorded task hash");
        }

        if !status.completed {
            let completed = retry_with_backoff(
                &self.retry,
                "completeTask",
                BlockchainError::is_transient,
                move || ledger.complete_task(expected),
            )
            .await;
            last_tx = settled(completed, reverts::TASK_COMPLETED)?.or(last_tx);
        }

        Ok(last_tx)
    }

    /// On-chain record for a task of `owner`.
    pub async fn chain_status(&self, owner: &Address, task_id: &str) -> AppResult<ChainStatus> {
        let task = self
            .store
            .get_task(owner, task_id)
            .ok_or(AppError::NotFound("Task"))?;
        let task_hash = match task.task_hash {
            Some(hash) => hash,
            None => task_hash_of(&task)?,
        };
        let on_chain = self.ledger.task_status(task_hash).await?;
        Ok(ChainStatus {
            task_id: task.id,
            task_hash,
            matches: on_chain.exists && on_chain.completed && on_chain.hash == task_hash,
            on_chain,
        })
    }
}

/// Treat the "already done" revert of an idempotent step as success.
fn settled(result: BlockchainResult<TxOutcome>, already_done: &str) -> AppResult<Option<TxHash>> {
    match result {
        Ok(outcome) => Ok(Some(outcome.tx_hash)),
        Err(BlockchainError::Reverted(reason)) if reason.contains(already_done) => {
            tracing::debug!(reason = %reason, "Ledger step already applied");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::MemoryLedger;
    use crate::config::RewardConfig;
    use crate::storage::StoreError;
    use crate::tasks::model::{Priority, TaskType};

    fn owner() -> Address {
        Address::repeat_byte(0x11)
    }

    fn relayer() -> Address {
        Address::repeat_byte(0xee)
    }

    struct Fixture {
        store: Arc<Store>,
        ledger: Arc<MemoryLedger>,
        verifier: Verifier,
    }

    fn fixture_with(config: VerificationConfig) -> Fixture {
        let store = Arc::new(Store::in_memory());
        store.record_login(owner(), Utc::now());
        let ledger = Arc::new(MemoryLedger::new(relayer()));
        let rewards = Arc::new(RewardService::new(store.clone(), None, RewardConfig::default()));
        let verifier = Verifier::new(store.clone(), ledger.clone(), rewards, &config);
        Fixture { store, ledger, verifier }
    }

    fn fixture() -> Fixture {
        fixture_with(VerificationConfig {
            base_delay_ms: 1,
            max_delay_ms: 2,
            ..VerificationConfig::default()
        })
    }

    fn insert_task(store: &Store, id: &str) -> Task {
        let mut task = Task {
            id: id.to_string(),
            content: format!("task {id}"),
            description: "details".to_string(),
            completed: false,
            created_at: Utc::now(),
            completed_at: None,
            priority: Priority::Medium,
            due_date: None,
            task_type: TaskType::Study,
            status: TaskStatus::InProgress,
            tags: vec![],
            user_address: owner(),
            verified: false,
            task_hash: None,
            tx_hash: None,
            ai_reasoning: None,
        };
        task.task_hash = Some(task_hash_of(&task).unwrap());
        store.insert_task(task).unwrap()
    }

    #[tokio::test]
    async fn test_relay_creates_completes_and_rewards() {
        let f = fixture();
        let task = insert_task(&f.store, "a");
        let hash = task.task_hash.unwrap();

        let outcome = f.verifier.verify(owner(), "a", VerifyRequest::default()).await.unwrap();
        assert_eq!(outcome.mode, VerificationMode::Relay);
        assert!(outcome.task.verified);
        assert!(outcome.task.completed);
        assert_eq!(outcome.task.status, TaskStatus::Completed);
        assert!(outcome.task.tx_hash.is_some());
        assert!(f.ledger.is_task_completed(hash));
        assert_eq!(outcome.reward.unwrap().amount, 15);
        assert_eq!(f.store.get_user(&owner()).unwrap().token_balance, 15.0);
    }

    #[tokio::test]
    async fn test_relay_is_idempotent_over_existing_record() {
        let f = fixture();
        let task = insert_task(&f.store, "a");
        f.ledger.create_task_as(relayer(), task.task_hash.unwrap()).unwrap();

        let outcome = f.verifier.verify(owner(), "a", VerifyRequest::default()).await.unwrap();
        assert!(outcome.task.verified);
        assert!(f.ledger.is_task_completed(task.task_hash.unwrap()));
    }

    #[tokio::test]
    async fn test_relay_refuses_record_of_another_wallet() {
        let f = fixture();
        let task = insert_task(&f.store, "a");
        let hash = task.task_hash.unwrap();
        let stranger = Address::repeat_byte(0x33);
        f.ledger.create_task_as(stranger, hash).unwrap();
        f.ledger.complete_task_as(stranger, hash).unwrap();

        let err = f.verifier.verify(owner(), "a", VerifyRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("another wallet")));
        assert!(!f.store.get_task(&owner(), "a").unwrap().verified);
        assert_eq!(f.store.get_user(&owner()).unwrap().token_balance, 0.0);
    }

    #[tokio::test]
    async fn test_verified_hash_cannot_be_claimed_again() {
        let f = fixture();
        let task = insert_task(&f.store, "a");
        f.verifier.verify(owner(), "a", VerifyRequest::default()).await.unwrap();
        assert!(f.store.delete_task(&owner(), "a"));

        let mut again = task.clone();
        again.id = "b".to_string();
        again.verified = false;
        assert!(matches!(f.store.insert_task(again.clone()), Err(StoreError::SpentHash)));

        let thief = Address::repeat_byte(0x55);
        f.store.record_login(thief, Utc::now());
        again.id = "c".to_string();
        again.user_address = thief;
        assert!(matches!(f.store.insert_task(again), Err(StoreError::SpentHash)));

        assert_eq!(f.store.get_user(&owner()).unwrap().token_balance, 15.0);
        assert_eq!(f.store.get_user(&thief).unwrap().token_balance, 0.0);
    }

    #[tokio::test]
    async fn test_concurrent_claim_is_rejected() {
        let f = fixture();
        let task = insert_task(&f.store, "a");
        let in_flight = f.verifier.in_flight();
        let _held = InFlight::claim(&in_flight, task.task_hash.unwrap()).unwrap();

        let err = f.verifier.verify(owner(), "a", VerifyRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("in progress")));
    }

    #[tokio::test]
    async fn test_relay_retries_transient_failures() {
        let f = fixture();
        insert_task(&f.store, "a");
        f.ledger.inject_transient_failures(2);

        let outcome = f.verifier.verify(owner(), "a", VerifyRequest::default()).await.unwrap();
        assert!(outcome.task.verified);
    }

    #[tokio::test]
    async fn test_hash_mismatch_rejected() {
        let f = fixture();
        insert_task(&f.store, "a");

        let request = VerifyRequest {
            task_hash: Some(B256::repeat_byte(0x99)),
            tx_hash: None,
        };
        let err = f.verifier.verify(owner(), "a", request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("hash")));
        assert!(!f.store.get_task(&owner(), "a").unwrap().verified);
    }

    #[tokio::test]
    async fn test_already_verified_rejected() {
        let f = fixture();
        insert_task(&f.store, "a");
        f.verifier.verify(owner(), "a", VerifyRequest::default()).await.unwrap();

        let err = f.verifier.verify(owner(), "a", VerifyRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_client_submission_accepted() {
        let f = fixture();
        let task = insert_task(&f.store, "a");
        let hash = task.task_hash.unwrap();
        f.ledger.create_task_as(owner(), hash).unwrap();
        let tx = f.ledger.complete_task_as(owner(), hash).unwrap().tx_hash;

        let request = VerifyRequest { task_hash: Some(hash), tx_hash: Some(tx) };
        let outcome = f.verifier.verify(owner(), "a", request).await.unwrap();
        assert_eq!(outcome.mode, VerificationMode::Client);
        assert_eq!(outcome.task.tx_hash, Some(tx));
    }

    #[tokio::test]
    async fn test_client_submission_from_foreign_sender_rejected() {
        let f = fixture();
        let task = insert_task(&f.store, "a");
        let hash = task.task_hash.unwrap();
        let stranger = Address::repeat_byte(0x33);
        f.ledger.create_task_as(stranger, hash).unwrap();
        let tx = f.ledger.complete_task_as(stranger, hash).unwrap().tx_hash;

        let request = VerifyRequest { task_hash: None, tx_hash: Some(tx) };
        let err = f.verifier.verify(owner(), "a", request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("not sent by the task owner")));
    }

    #[tokio::test]
    async fn test_client_submission_for_another_hash_rejected() {
        let f = fixture();
        let task = insert_task(&f.store, "a");
        let hash = task.task_hash.unwrap();
        let stranger = Address::repeat_byte(0x33);
        f.ledger.create_task_as(stranger, hash).unwrap();
        f.ledger.complete_task_as(stranger, hash).unwrap();

        // The owner's own, unrelated ledger transaction
        let unrelated = f.ledger.create_task_as(owner(), B256::repeat_byte(0x77)).unwrap().tx_hash;

        let request = VerifyRequest { task_hash: None, tx_hash: Some(unrelated) };
        let err = f.verifier.verify(owner(), "a", request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("did not complete this task")));
        assert!(!f.store.get_task(&owner(), "a").unwrap().verified);
    }

    #[tokio::test]
    async fn test_client_submission_failed_receipt_rejected() {
        let f = fixture();
        insert_task(&f.store, "a");
        let tx = f.ledger.record_reverted_tx(owner());

        let request = VerifyRequest { task_hash: None, tx_hash: Some(tx) };
        let err = f.verifier.verify(owner(), "a", request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("failed")));
    }

    #[tokio::test]
    async fn test_client_submission_uncompleted_record_rejected() {
        let f = fixture();
        let task = insert_task(&f.store, "a");
        let tx = f.ledger.create_task_as(owner(), task.task_hash.unwrap()).unwrap().tx_hash;

        let request = VerifyRequest { task_hash: None, tx_hash: Some(tx) };
        let err = f.verifier.verify(owner(), "a", request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("not completed")));
    }

    #[tokio::test]
    async fn test_unknown_transaction_rejected() {
        let f = fixture();
        insert_task(&f.store, "a");

        let request = VerifyRequest { task_hash: None, tx_hash: Some(TxHash::repeat_byte(1)) };
        let err = f.verifier.verify(owner(), "a", request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_relay_disabled_requires_tx_hash() {
        let f = fixture_with(VerificationConfig {
            relay_enabled: false,
            ..VerificationConfig::default()
        });
        insert_task(&f.store, "a");

        let err = f.verifier.verify(owner(), "a", VerifyRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_other_owner_cannot_verify() {
        let f = fixture();
        insert_task(&f.store, "a");

        let err = f
            .verifier
            .verify(Address::repeat_byte(0x44), "a", VerifyRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_chain_status_reports_match() {
        let f = fixture();
        insert_task(&f.store, "a");

        let before = f.verifier.chain_status(&owner(), "a").await.unwrap();
        assert!(!before.on_chain.exists);
        assert!(!before.matches);

        f.verifier.verify(owner(), "a", VerifyRequest::default()).await.unwrap();
        let after = f.verifier.chain_status(&owner(), "a").await.unwrap();
        assert!(after.matches);
    }
}
