//! Per-client token bucket rate limiting.
//!
//! A bucket left idle long enough to refill completely is equivalent to a
//! fresh one, so such buckets are swept out periodically.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::observability::metrics;

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shortest idle time before a bucket may be dropped.
const MIN_IDLE_TTL: Duration = Duration::from_secs(60);

struct Buckets {
    by_client: HashMap<IpAddr, TokenBucket>,
    last_sweep: Instant,
}

impl Buckets {
    fn sweep(&mut self, now: Instant, idle_ttl: Duration) -> usize {
        let before = self.by_client.len();
        self.by_client
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < idle_ttl);
        self.last_sweep = now;
        before - self.by_client.len()
    }
}

/// Buckets keyed by client IP.
pub struct RateLimiterState {
    buckets: Mutex<Buckets>,
    enabled: bool,
    rps: f64,
    burst: f64,
    idle_ttl: Duration,
}

impl RateLimiterState {
    pub fn new(config: &RateLimitConfig) -> Self {
        let rps = config.requests_per_second as f64;
        let burst = config.burst_size as f64;
        let refill = if rps > 0.0 {
            Duration::from_secs_f64(burst / rps)
        } else {
            MIN_IDLE_TTL
        };

        Self {
            buckets: Mutex::new(Buckets {
                by_client: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            enabled: config.enabled,
            rps,
            burst,
            idle_ttl: refill.max(MIN_IDLE_TTL),
        }
    }

    /// Take one token for `client`. Always succeeds when disabled.
    pub fn check(&self, client: IpAddr) -> bool {
        if !self.enabled {
            return true;
        }
        let now = Instant::now();
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        if now.saturating_duration_since(buckets.last_sweep) >= self.idle_ttl {
            let evicted = buckets.sweep(now, self.idle_ttl);
            tracing::debug!(evicted, remaining = buckets.by_client.len(), "Swept idle rate limit buckets");
        }

        let bucket = buckets
            .by_client
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.burst));

        bucket.try_acquire(self.burst, self.rps)
    }

    /// Drop buckets idle at `now` for longer than a full refill.
    pub(crate) fn evict_idle(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        buckets.sweep(now, self.idle_ttl)
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.buckets.lock().expect("rate limiter mutex poisoned").by_client.len()
    }
}

/// Middleware rejecting clients that exhausted their bucket with 429.
///
/// Requests without connection info (in-process callers) share one bucket.
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if state.check(client) {
        next.run(request).await
    } else {
        tracing::warn!(client = %client, path = %request.uri().path(), "Rate limit exceeded");
        metrics::record_rate_limited();
        AppError::RateLimited.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(enabled: bool, rps: u32, burst: u32) -> RateLimiterState {
        RateLimiterState::new(&RateLimitConfig {
            enabled,
            requests_per_second: rps,
            burst_size: burst,
        })
    }

    #[test]
    fn test_burst_then_reject() {
        let state = limiter(true, 1, 3);
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert!(state.check(ip));
        assert!(state.check(ip));
        assert!(state.check(ip));
        assert!(!state.check(ip));
    }

    #[test]
    fn test_clients_have_separate_buckets() {
        let state = limiter(true, 1, 1);
        assert!(state.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(!state.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(state.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))));
    }

    #[test]
    fn test_disabled_never_limits() {
        let state = limiter(false, 1, 1);
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        for _ in 0..10 {
            assert!(state.check(ip));
        }
    }

    #[test]
    fn test_idle_buckets_are_evicted() {
        let state = limiter(true, 10, 5);
        for i in 0..100 {
            assert!(state.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, i))));
        }
        assert_eq!(state.tracked_clients(), 100);

        assert_eq!(state.evict_idle(Instant::now()), 0);
        assert_eq!(state.evict_idle(Instant::now() + Duration::from_secs(120)), 100);
        assert_eq!(state.tracked_clients(), 0);

        // An evicted client starts over with a full bucket
        assert!(state.check(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
    }
}
