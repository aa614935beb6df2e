//! On-chain MOM token transfers.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use crate::blockchain::contracts::MomToken;
use crate::blockchain::{BlockchainClient, BlockchainError, BlockchainResult, TxBuilder, TxOutcome, Wallet};
use crate::observability::metrics;

/// Something that can mint or transfer reward tokens to a user.
#[async_trait]
pub trait TokenRewarder: Send + Sync {
    async fn reward(&self, to: Address, amount: U256) -> BlockchainResult<TxOutcome>;
}

/// `MomToken` contract signed for by the rewarder wallet.
pub struct MomTokenRewarder {
    client: BlockchainClient,
    token: Address,
    sender: TxBuilder,
    confirmation_timeout_secs: u64,
}

impl MomTokenRewarder {
    pub fn new(client: BlockchainClient, token: Address, wallet: Wallet) -> Self {
        let confirmation_timeout_secs = client.config().confirmation_timeout_secs;
        Self {
            sender: TxBuilder::new(client.clone(), wallet),
            client,
            token,
            confirmation_timeout_secs,
        }
    }

    async fn token_owner(&self) -> BlockchainResult<Address> {
        let tx = TransactionRequest::default()
            .with_to(self.token)
            .with_input(Bytes::from(MomToken::ownerCall {}.abi_encode()));
        let data = self.client.call(tx).await?;
        MomToken::ownerCall::abi_decode_returns(&data)
            .map_err(|e| BlockchainError::Decode(e.to_string()))
    }

    async fn send<C: SolCall>(&self, method: &'static str, call: C) -> BlockchainResult<TxOutcome> {
        let result = self
            .sender
            .send_and_confirm(self.token, Bytes::from(call.abi_encode()), self.confirmation_timeout_secs)
            .await;
        metrics::record_ledger_call(method, result.is_ok());
        result
    }
}

#[async_trait]
impl TokenRewarder for MomTokenRewarder {
    /// Pays through `rewardTo` when the rewarder owns the token, and through
    /// `publicRewardTo` otherwise or when `rewardTo` reverts.
    async fn reward(&self, to: Address, amount: U256) -> BlockchainResult<TxOutcome> {
        let is_owner = match self.token_owner().await {
            Ok(owner) => owner == self.sender.address(),
            Err(e) => {
                tracing::debug!(error = %e, "Could not read token owner, trying rewardTo");
                true
            }
        };

        if is_owner {
            match self.send("rewardTo", MomToken::rewardToCall { to, amount }).await {
                Err(BlockchainError::Reverted(reason)) => {
                    tracing::warn!(reason = %reason, "rewardTo reverted, trying publicRewardTo");
                }
                other => return other,
            }
        }

        self.send("publicRewardTo", MomToken::publicRewardToCall { to, amount })
            .await
    }
}
