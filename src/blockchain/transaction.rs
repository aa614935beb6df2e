//! Contract-call transactions: pricing, signing, broadcast and confirmation.
//!
//! # Design Decisions
//! - Sends are serialized per builder: the nonce is read from chain, used,
//!   and the transaction confirmed before the next send starts
//! - A failed gas estimate is a revert; nothing is broadcast
//! - The inclusion block counts as the first confirmation

use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, timeout};

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::types::{BlockchainError, BlockchainResult, TxOutcome};
use crate::blockchain::wallet::Wallet;

/// Headroom added on top of the node's gas estimate, in percent.
const GAS_LIMIT_BUFFER_PERCENT: u64 = 20;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Sends contract calls signed by one wallet.
pub struct TxBuilder {
    client: BlockchainClient,
    wallet: Wallet,
    send_lock: Mutex<()>,
}

impl TxBuilder {
    pub fn new(client: BlockchainClient, wallet: Wallet) -> Self {
        Self {
            client,
            wallet,
            send_lock: Mutex::new(()),
        }
    }

    /// Gas price to bid, after the configured multiplier.
    ///
    /// Refuses to bid at all while the network price is above the cap.
    async fn bid_price(&self) -> BlockchainResult<u128> {
        let config = self.client.config();
        let network = self.client.get_gas_price().await?;
        let network_gwei = network / WEI_PER_GWEI;

        if network_gwei > u128::from(config.max_gas_price_gwei) {
            return Err(BlockchainError::GasPriceTooHigh {
                current_gwei: network_gwei as u64,
                max_gwei: config.max_gas_price_gwei,
            });
        }
        Ok((network as f64 * config.gas_price_multiplier) as u128)
    }

    /// Fill in gas, nonce and pricing for a call of `data` on `to`.
    pub async fn build(&self, to: Address, data: Bytes) -> BlockchainResult<TransactionRequest> {
        let from = self.wallet.address();
        let call = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(U256::ZERO)
            .with_input(data);

        let estimated = self.client.estimate_gas(call.clone()).await?;
        let nonce = self.client.get_transaction_count(from).await?;
        let gas_price = self.bid_price().await?;

        Ok(call
            .with_nonce(nonce)
            .with_gas_price(gas_price)
            .with_chain_id(self.wallet.chain_id())
            .with_gas_limit(estimated + estimated * GAS_LIMIT_BUFFER_PERCENT / 100))
    }

    /// Build, sign, broadcast and wait for confirmation of a contract call.
    pub async fn send_and_confirm(
        &self,
        to: Address,
        data: Bytes,
        timeout_secs: u64,
    ) -> BlockchainResult<TxOutcome> {
        let _guard = self.send_lock.lock().await;

        let envelope = self
            .build(to, data)
            .await?
            .build(&self.wallet.ethereum_wallet())
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Signing failed: {}", e)))?;

        let tx_hash = self.client.send_raw_transaction(envelope.encoded_2718()).await?;
        tracing::info!(tx_hash = %tx_hash, to = %to, "Transaction broadcast");

        let required = self.client.confirmation_blocks();
        let block_number = timeout(
            Duration::from_secs(timeout_secs),
            self.confirmed_block(tx_hash, required),
        )
        .await
        .map_err(|_| BlockchainError::ConfirmationTimeout(required))??;

        Ok(TxOutcome {
            tx_hash,
            block_number,
        })
    }

    /// Poll until `tx_hash` has `required` confirmations; returns its block.
    async fn confirmed_block(&self, tx_hash: TxHash, required: u32) -> BlockchainResult<u64> {
        let mut ticker = interval(RECEIPT_POLL_INTERVAL);
        loop {
            ticker.tick().await;

            let Some(receipt) = self.client.receipt_summary(tx_hash).await? else {
                tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                continue;
            };
            if !receipt.success {
                return Err(BlockchainError::Reverted("Transaction reverted".to_string()));
            }

            let head = self.client.get_block_number().await?;
            let included = receipt.block_number.unwrap_or(head);
            let depth = head.saturating_sub(included) as u32 + 1;
            if depth >= required {
                return Ok(included);
            }
            tracing::debug!(tx_hash = %tx_hash, depth, required, "Waiting for confirmations");
        }
    }

    /// Address the builder signs with.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}
