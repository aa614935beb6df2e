//! Momentum task service library.
//!
//! Tasks are stored off-chain; completing one can be proven on an EVM ledger
//! by its keccak256 task hash, which pays a MOM token reward.

pub mod ai;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod rewards;
pub mod security;
pub mod storage;
pub mod tasks;
pub mod users;
pub mod verification;

pub use config::MomentumConfig;
pub use error::{AppError, AppResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
