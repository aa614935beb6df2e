//! Wallet users: login upsert and off-chain MOM balances.

pub mod model;
pub mod service;

pub use model::User;
pub use service::{LoginResponse, UserService};
