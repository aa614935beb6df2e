//! Background reconciliation of off-chain state with the ledger.
//!
//! # Responsibilities
//! - Periodically scan completed but unverified tasks
//! - Mark a task verified when the ledger shows its hash completed
//! - Pay the reward that the interrupted verification never paid

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::blockchain::{BlockchainResult, TaskLedger};
use crate::config::VerificationConfig;
use crate::error::AppError;
use crate::observability::metrics;
use crate::rewards::RewardService;
use crate::storage::Store;
use crate::tasks::model::Task;
use crate::verification::verifier::{InFlight, InFlightHashes};

pub struct Reconciler {
    store: Arc<Store>,
    ledger: Arc<dyn TaskLedger>,
    rewards: Arc<RewardService>,
    in_flight: InFlightHashes,
    config: VerificationConfig,
}

impl Reconciler {
    /// `in_flight` must be the verifier's set, so the two never verify the
    /// same hash at once.
    pub fn new(
        store: Arc<Store>,
        ledger: Arc<dyn TaskLedger>,
        rewards: Arc<RewardService>,
        in_flight: InFlightHashes,
        config: VerificationConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            rewards,
            in_flight,
            config,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.reconcile_enabled {
            tracing::info!("Ledger reconciliation disabled");
            return;
        }

        tracing::info!(
            interval = self.config.reconcile_interval_secs,
            ledger = self.ledger.name(),
            "Reconciler starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.reconcile_interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Reconciler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One pass over the store. Returns how many tasks were healed.
    pub async fn run_once(&self) -> usize {
        let mut healed = 0;

        for task in self.store.completed_unverified() {
            match self.reconcile_task(&task).await {
                Ok(true) => healed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Ledger unreachable, postponing reconciliation");
                    break;
                }
            }
        }

        healed
    }

    /// Mark `task` verified if the ledger shows its hash completed.
    ///
    /// `task` may be stale: the stored copy is rechecked under the store's
    /// entry lock, and the reward is paid only on the unverified → verified
    /// transition made here.
    pub async fn reconcile_task(&self, task: &Task) -> BlockchainResult<bool> {
        let Some(hash) = task.task_hash else {
            return Ok(false);
        };
        let Some(_guard) = InFlight::claim(&self.in_flight, hash) else {
            tracing::debug!(task_id = %task.id, "Verification in progress, skipping");
            return Ok(false);
        };
        if self.store.is_spent(&hash) {
            return Ok(false);
        }

        let status = self.ledger.task_status(hash).await?;
        if !(status.exists && status.completed && status.hash == hash) {
            return Ok(false);
        }

        let updated = self.store.modify_task(&task.user_address, &task.id, |t| {
            if t.verified || t.task_hash != Some(hash) {
                return Err(AppError::Conflict("Task changed since scan".to_string()));
            }
            t.verified = true;
            Ok(())
        });
        match updated {
            Ok(Some(task)) => {
                metrics::record_verification("reconciled");
                tracing::info!(task_id = %task.id, task_hash = %hash, "Reconciled task with ledger");
                self.rewards.pay(task.user_address, &task).await;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(AppError::Conflict(_)) => {
                tracing::debug!(task_id = %task.id, "Task already settled");
                Ok(false)
            }
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "Failed to reconcile task");
                Ok(false)
            }
        }
    }
}
