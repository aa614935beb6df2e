//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP token bucket)
//!     → body limit (tower-http, from security.max_body_size)
//!     → handler
//!     → headers.rs (hardening headers, CORS)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input; ownership comes only from the bearer token

pub mod headers;
pub mod rate_limit;

pub use headers::{apply_security_headers, cors_layer};
pub use rate_limit::{rate_limit_middleware, RateLimiterState};
