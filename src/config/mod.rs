//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: RPC URL, contracts, secrets)
//!     → validation.rs (semantic checks)
//!     → MomentumConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Secrets come only from the environment and are skipped by serde
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AiConfig, AuthConfig, BlockchainConfig, ListenerConfig, MomentumConfig, ObservabilityConfig,
    RateLimitConfig, RewardConfig, SecurityConfig, StorageConfig, TimeoutConfig,
    VerificationConfig,
};
