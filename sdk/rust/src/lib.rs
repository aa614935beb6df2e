//! HTTP client for the Momentum task API.

pub mod client;
pub mod types;

pub use client::{ClientError, MomentumClient};
pub use types::{ChainStatus, LoginResponse, NewTask, RewardReceipt, Task, User, VerifyResponse};
