//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that enabled features have what they need
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MomentumConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use std::net::SocketAddr;

use crate::config::schema::MomentumConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &MomentumConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.token_ttl_secs", "must be greater than 0"));
    }

    if config.auth.jwt_secret.len() < 16 {
        errors.push(ValidationError::new("auth.jwt_secret", "must be at least 16 bytes"));
    }

    if config.storage.snapshot_path.is_some() && config.storage.flush_interval_ms == 0 {
        errors.push(ValidationError::new("storage.flush_interval_ms", "must be greater than 0"));
    }

    if config.ai.enabled && config.ai.timeout_secs == 0 {
        errors.push(ValidationError::new("ai.timeout_secs", "must be greater than 0"));
    }

    if !(0.0..=2.0).contains(&config.ai.temperature) {
        errors.push(ValidationError::new("ai.temperature", "must be within 0.0..=2.0"));
    }

    let chain = &config.blockchain;
    if chain.enabled {
        if url::Url::parse(&chain.rpc_url).is_err() {
            errors.push(ValidationError::new("blockchain.rpc_url", "is not a valid URL"));
        }
        if chain.task_contract.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                "blockchain.task_contract",
                "must be a 0x-prefixed contract address when blockchain is enabled",
            ));
        }
        if chain.rpc_timeout_secs == 0 {
            errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be greater than 0"));
        }
        if chain.gas_price_multiplier < 1.0 {
            errors.push(ValidationError::new("blockchain.gas_price_multiplier", "must be at least 1.0"));
        }
    }

    if !config.rewards.token_contract.is_empty()
        && config.rewards.token_contract.parse::<Address>().is_err()
    {
        errors.push(ValidationError::new("rewards.token_contract", "is not a valid address"));
    }

    let verification = &config.verification;
    if verification.max_attempts == 0 {
        errors.push(ValidationError::new("verification.max_attempts", "must be at least 1"));
    }
    if verification.base_delay_ms > verification.max_delay_ms {
        errors.push(ValidationError::new(
            "verification.base_delay_ms",
            "must not exceed verification.max_delay_ms",
        ));
    }
    if verification.reconcile_enabled && verification.reconcile_interval_secs == 0 {
        errors.push(ValidationError::new(
            "verification.reconcile_interval_secs",
            "must be greater than 0",
        ));
    }

    if config.rate_limit.enabled && config.rate_limit.requests_per_second == 0 {
        errors.push(ValidationError::new("rate_limit.requests_per_second", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "is not a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
