//! Logs and metrics.
//!
//! ```text
//! handlers, verifier, reconciler, rewards
//!     → logging.rs  (tracing events to stdout, level from config or RUST_LOG)
//!     → metrics.rs  (Prometheus counters and histograms on their own port)
//! ```
//!
//! Every HTTP request runs inside a span carrying its `x-request-id`, so
//! events logged by the services underneath inherit it.

pub mod logging;
pub mod metrics;
