//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the store and pick the ledger backend
//! - Load signing wallets from the environment
//! - Wire services into the HTTP state and the reconciler
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Backends are built in [`Services`] and injected into [`assemble`], so
//!   tests can swap the chain for an in-memory ledger

use alloy::primitives::{keccak256, Address};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::ai::{build_advisor, PriorityAdvisor};
use crate::auth::JwtKeys;
use crate::blockchain::wallet::{PRIVATE_KEY_ENV_VAR, REWARDER_PRIVATE_KEY_ENV_VAR};
use crate::blockchain::{
    BlockchainClient, BlockchainError, EvmTaskLedger, MemoryLedger, TaskLedger, Wallet,
};
use crate::config::MomentumConfig;
use crate::http::AppState;
use crate::rewards::{MomTokenRewarder, RewardService, TokenRewarder};
use crate::security::RateLimiterState;
use crate::storage::{Store, StoreError};
use crate::tasks::TaskService;
use crate::users::UserService;
use crate::verification::{Reconciler, Verifier};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to open store: {0}")]
    Store(#[from] StoreError),

    #[error("Blockchain setup failed: {0}")]
    Blockchain(#[from] BlockchainError),

    #[error("Invalid address in {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Signer the in-memory ledger relays writes with when no key is configured.
pub fn memory_relayer() -> Address {
    Address::from_word(keccak256("momentum.memory-relayer"))
}

/// Backends the application runs on.
pub struct Services {
    pub store: Arc<Store>,
    pub ledger: Arc<dyn TaskLedger>,
    pub rewarder: Option<Arc<dyn TokenRewarder>>,
    pub advisor: Arc<dyn PriorityAdvisor>,
}

impl Services {
    /// Build the backends described by `config`.
    pub async fn from_config(config: &MomentumConfig) -> Result<Self, StartupError> {
        let store = Arc::new(Store::open(
            config.storage.snapshot_path.as_ref().map(PathBuf::from),
        )?);
        let advisor = build_advisor(&config.ai);
        let chain_id = config.blockchain.chain_id;
        let relayer = Wallet::from_env(PRIVATE_KEY_ENV_VAR, chain_id)?;

        if !config.blockchain.enabled {
            let signer = relayer.as_ref().map(Wallet::address).unwrap_or_else(memory_relayer);
            tracing::warn!(signer = %signer, "Blockchain disabled, using in-memory ledger");
            if !config.rewards.token_contract.is_empty() {
                tracing::warn!("Token contract configured without blockchain; rewards are credited off-chain only");
            }
            return Ok(Self {
                store,
                ledger: Arc::new(MemoryLedger::new(signer)),
                rewarder: None,
                advisor,
            });
        }

        let client = BlockchainClient::new(config.blockchain.clone()).await?;
        let contract = parse_address("blockchain.task_contract", &config.blockchain.task_contract)?;

        if relayer.is_none() {
            tracing::warn!(
                "{} not set; relay verification disabled, clients must submit their own transactions",
                PRIVATE_KEY_ENV_VAR
            );
        }
        let ledger: Arc<dyn TaskLedger> =
            Arc::new(EvmTaskLedger::new(client.clone(), contract, relayer.clone()));

        let rewarder: Option<Arc<dyn TokenRewarder>> = if config.rewards.enabled
            && !config.rewards.token_contract.is_empty()
        {
            let token = parse_address("rewards.token_contract", &config.rewards.token_contract)?;
            match Wallet::from_env(REWARDER_PRIVATE_KEY_ENV_VAR, chain_id)?.or(relayer) {
                Some(wallet) => {
                    tracing::info!(token = %token, rewarder = %wallet.address(), "On-chain rewards enabled");
                    Some(Arc::new(MomTokenRewarder::new(client, token, wallet)))
                }
                None => {
                    tracing::warn!("No rewarder key; rewards are credited off-chain only");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            store,
            ledger,
            rewarder,
            advisor,
        })
    }

    /// Memory-only backends with the given advisor. Used by tests and demos.
    pub fn in_memory(ledger: Arc<dyn TaskLedger>, advisor: Arc<dyn PriorityAdvisor>) -> Self {
        Self {
            store: Arc::new(Store::in_memory()),
            ledger,
            rewarder: None,
            advisor,
        }
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, StartupError> {
    value.parse().map_err(|_| StartupError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

/// The wired application: request state plus the background reconciler.
pub struct Application {
    pub state: AppState,
    pub reconciler: Reconciler,
}

/// Wire services into the HTTP state and the reconciler.
pub fn assemble(config: &MomentumConfig, services: Services) -> Application {
    let Services {
        store,
        ledger,
        rewarder,
        advisor,
    } = services;

    let jwt = Arc::new(JwtKeys::new(&config.auth.jwt_secret, config.auth.token_ttl_secs));
    let rewards = Arc::new(RewardService::new(store.clone(), rewarder, config.rewards.clone()));
    let verifier = Arc::new(Verifier::new(
        store.clone(),
        ledger.clone(),
        rewards.clone(),
        &config.verification,
    ));

    tracing::info!(
        ledger = ledger.name(),
        contract = %ledger.contract(),
        advisor = advisor.name(),
        relay = config.verification.relay_enabled && ledger.signer().is_some(),
        "Services initialized"
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        store: store.clone(),
        tasks: Arc::new(TaskService::new(store.clone(), advisor)),
        users: Arc::new(UserService::new(store.clone(), jwt.clone())),
        verifier: verifier.clone(),
        jwt,
        rate_limiter: Arc::new(RateLimiterState::new(&config.rate_limit)),
    };

    let reconciler = Reconciler::new(
        store,
        ledger,
        rewards,
        verifier.in_flight(),
        config.verification.clone(),
    );

    Application { state, reconciler }
}
