//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::MomentumConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Environment variable holding the RPC endpoint.
pub const RPC_URL_ENV_VAR: &str = "SEPOLIA_RPC_URL";
/// Environment variable holding the TaskManager contract address.
pub const TASK_CONTRACT_ENV_VAR: &str = "NEXT_PUBLIC_CONTRACT_ADDRESS";
/// Environment variable holding the MOM token contract address.
pub const TOKEN_CONTRACT_ENV_VAR: &str = "NEXT_PUBLIC_MOM_TOKEN_ADDRESS";
/// Environment variable holding the JWT signing secret.
pub const JWT_SECRET_ENV_VAR: &str = "JWT_SECRET";
/// Environment variable holding the Generative Language API key.
pub const AI_API_KEY_ENV_VAR: &str = "GOOGLE_API_KEY";
/// Legacy document-store URI; accepted but unused.
pub const MONGODB_URI_ENV_VAR: &str = "MONGODB_URI";

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
///
/// A missing path yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<MomentumConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str::<MomentumConfig>(&content)?
        }
        None => MomentumConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay values from the environment onto a parsed config.
///
/// `lookup` abstracts the environment so the mapping can be tested without
/// touching process state.
pub fn apply_env_overrides<F>(config: &mut MomentumConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(RPC_URL_ENV_VAR) {
        config.blockchain.rpc_url = url;
    }

    if let Some(address) = get(TASK_CONTRACT_ENV_VAR) {
        config.blockchain.task_contract = address;
        config.blockchain.enabled = true;
    }

    if let Some(address) = get(TOKEN_CONTRACT_ENV_VAR) {
        config.rewards.token_contract = address;
    }

    if let Some(secret) = get(JWT_SECRET_ENV_VAR) {
        config.auth.jwt_secret = secret;
    } else {
        tracing::warn!("{} not set, using the development signing secret", JWT_SECRET_ENV_VAR);
    }

    if let Some(key) = get(AI_API_KEY_ENV_VAR) {
        config.ai.api_key = Some(key);
    }

    if get(MONGODB_URI_ENV_VAR).is_some() {
        tracing::warn!(
            "{} is set but ignored; tasks are kept in the built-in store",
            MONGODB_URI_ENV_VAR
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            (RPC_URL_ENV_VAR, "https://rpc.sepolia.example"),
            (TASK_CONTRACT_ENV_VAR, "0xcD177D4704A85879D5E8Fc78a6981246Ce10f830"),
            (JWT_SECRET_ENV_VAR, "a-much-longer-test-secret"),
            (AI_API_KEY_ENV_VAR, "test-key"),
        ]);

        let mut config = MomentumConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).cloned());

        assert_eq!(config.blockchain.rpc_url, "https://rpc.sepolia.example");
        assert!(config.blockchain.enabled);
        assert_eq!(config.auth.jwt_secret, "a-much-longer-test-secret");
        assert_eq!(config.ai.api_key.as_deref(), Some("test-key"));
        assert!(config.rewards.token_contract.is_empty());
    }

    #[test]
    fn test_blank_env_values_ignored() {
        let vars = env(&[(TASK_CONTRACT_ENV_VAR, "  ")]);
        let mut config = MomentumConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).cloned());
        assert!(!config.blockchain.enabled);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[listener]\nbind_address = \"127.0.0.1:4000\"\n\n[verification]\nmax_attempts = 5"
        )
        .unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let config: MomentumConfig = toml::from_str(&content).unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:4000");
        assert_eq!(config.verification.max_attempts, 5);
        assert_eq!(config.verification.base_delay_ms, 500);
        assert_eq!(config.auth.token_ttl_secs, 7 * 24 * 3600);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener\nbind_address = 1").unwrap();
        let result = load_config(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
