//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.
//! Secrets (private keys, JWT secret, API keys) are never part of the file;
//! they are read from the environment by the loader.

use serde::{Deserialize, Serialize};

/// Root configuration for the Momentum service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MomentumConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Wallet login and token settings.
    pub auth: AuthConfig,

    /// Task and user persistence.
    pub storage: StorageConfig,

    /// AI priority advisor.
    pub ai: AiConfig,

    /// Blockchain integration settings.
    pub blockchain: BlockchainConfig,

    /// MOM token rewards.
    pub rewards: RewardConfig,

    /// On-chain verification and reconciliation.
    pub verification: VerificationConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Security hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    ///
    /// Relay-mode verification waits for block confirmations, so this is
    /// deliberately larger than a typical API timeout.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 120 }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Lifetime of issued tokens in seconds.
    pub token_ttl_secs: u64,

    /// HMAC secret. Populated from `JWT_SECRET`; never written to disk.
    #[serde(skip)]
    pub jwt_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 7 * 24 * 3600,
            // WARNING: This is a placeholder! Set JWT_SECRET in production.
            jwt_secret: "momentum-secret-key-change-in-production".to_string(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Optional JSON snapshot file. When unset the store is memory-only.
    pub snapshot_path: Option<String>,

    /// How often pending changes are written to the snapshot, in milliseconds.
    pub flush_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            flush_interval_ms: 500,
        }
    }
}

/// AI priority advisor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AiConfig {
    /// Enable the remote model. The keyword advisor is always available.
    pub enabled: bool,

    /// Generative Language API base URL.
    pub base_url: String,

    /// Model name.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// API key. Populated from `GOOGLE_API_KEY`; never written to disk.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://generativelanguage.googleapis.com/v1".to_string(),
            model: "gemini-1.5-pro".to_string(),
            temperature: 0.2,
            timeout_secs: 20,
            api_key: None,
        }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// Enable blockchain integration. When disabled an in-memory ledger is used.
    pub enabled: bool,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (11155111 for Sepolia, 31337 for local Anvil).
    pub chain_id: u64,

    /// Address of the TaskManager contract.
    pub task_contract: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required for finality.
    pub confirmation_blocks: u32,

    /// Maximum time to wait for a transaction to confirm, in seconds.
    pub confirmation_timeout_secs: u64,

    /// Gas price multiplier (1.0 = estimated, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 11_155_111,
            task_contract: String::new(),
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            confirmation_timeout_secs: 90,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
        }
    }
}

/// Token reward configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Pay rewards on successful verification.
    pub enabled: bool,

    /// Address of the MOM token contract. Empty means off-chain credit only.
    pub token_contract: String,

    /// Token decimals.
    pub decimals: u8,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_contract: String::new(),
            decimals: 18,
        }
    }
}

/// Verification and reconciliation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Allow the server wallet to write to the ledger when the client did not
    /// submit a transaction itself.
    pub relay_enabled: bool,

    /// Maximum attempts for each relayed ledger write.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Run the background reconciler.
    pub reconcile_enabled: bool,

    /// Reconciler interval in seconds.
    pub reconcile_interval_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            relay_enabled: true,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
            reconcile_enabled: true,
            reconcile_interval_secs: 60,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per second per client.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 20,
            burst_size: 40,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Origins allowed by CORS. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 256 * 1024,
            allowed_origins: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
