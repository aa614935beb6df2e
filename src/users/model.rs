use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tasks::model::timestamp;

/// A wallet-identified account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub address: Address,
    #[serde(default)]
    pub token_balance: f64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub last_login: DateTime<Utc>,
}

impl User {
    pub fn new(address: Address, now: DateTime<Utc>) -> Self {
        Self {
            address,
            token_balance: 0.0,
            created_at: now,
            last_login: now,
        }
    }
}
