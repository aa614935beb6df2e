//! MOM token rewards for verified tasks.
//!
//! # Responsibilities
//! - Look up the reward for a task's type and priority
//! - Transfer tokens on-chain when a token contract and rewarder key exist
//! - Credit the off-chain balance in every case
//!
//! # Design Decisions
//! - Rewards run after verification has been committed; a failed transfer
//!   is reported in the outcome and never undoes verification

pub mod schedule;
pub mod token;

pub use schedule::{reward_amount, to_base_units};
pub use token::{MomTokenRewarder, TokenRewarder};

use alloy::primitives::{Address, TxHash};
use serde::Serialize;
use std::sync::Arc;

use crate::config::RewardConfig;
use crate::observability::metrics;
use crate::storage::Store;
use crate::tasks::model::Task;

/// What a reward payment did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardReceipt {
    /// Whole MOM tokens.
    pub amount: u64,
    /// Whether the off-chain balance was credited.
    pub credited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RewardService {
    store: Arc<Store>,
    rewarder: Option<Arc<dyn TokenRewarder>>,
    config: RewardConfig,
}

impl RewardService {
    pub fn new(store: Arc<Store>, rewarder: Option<Arc<dyn TokenRewarder>>, config: RewardConfig) -> Self {
        Self {
            store,
            rewarder,
            config,
        }
    }

    /// Pay the reward for a verified task. Returns `None` when rewards are
    /// disabled.
    pub async fn pay(&self, owner: Address, task: &Task) -> Option<RewardReceipt> {
        if !self.config.enabled {
            return None;
        }
        let amount = reward_amount(task.task_type, task.priority);

        let (tx_hash, error) = match &self.rewarder {
            Some(rewarder) => {
                match rewarder
                    .reward(owner, to_base_units(amount, self.config.decimals))
                    .await
                {
                    Ok(outcome) => (Some(outcome.tx_hash), None),
                    Err(e) => {
                        tracing::error!(
                            task_id = %task.id,
                            owner = %owner,
                            amount,
                            error = %e,
                            "On-chain reward failed"
                        );
                        (None, Some("On-chain reward transfer failed".to_string()))
                    }
                }
            }
            None => (None, None),
        };

        let credited = self.store.adjust_balance(&owner, amount as f64).is_some();
        if !credited {
            tracing::warn!(owner = %owner, "No user record to credit reward to");
        }

        let outcome = match (&tx_hash, &error) {
            (Some(_), _) => "paid",
            (None, Some(_)) => "failed",
            (None, None) => "credited",
        };
        metrics::record_reward(outcome);
        tracing::info!(task_id = %task.id, owner = %owner, amount, outcome, "Reward processed");

        Some(RewardReceipt {
            amount,
            credited,
            tx_hash,
            error,
        })
    }
}
