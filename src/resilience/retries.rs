//! Retry logic.
//!
//! # Responsibilities
//! - Re-run an async operation while its error is transient
//! - Space attempts with exponential backoff + jitter
//!
//! # Design Decisions
//! - The caller decides which errors are transient; everything else fails
//!   immediately
//! - Jittered backoff prevents thundering herd against RPC providers

use std::fmt::Display;
use std::future::Future;

use crate::config::VerificationConfig;
use crate::resilience::backoff::jittered_delay;

/// Attempt budget and delay bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &VerificationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the attempt budget is
/// spent.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    is_transient: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && is_transient(&e) => {
                let delay = jittered_delay(attempt, policy.base_delay_ms, policy.max_delay_ms);
                tracing::warn!(
                    operation = operation,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
