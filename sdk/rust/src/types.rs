//! Wire types of the Momentum API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    pub completed: bool,
    pub created_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    pub priority: String,
    #[serde(default)]
    pub due_date: Option<String>,
    pub task_type: String,
    pub status: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub user_address: String,
    pub verified: bool,
    #[serde(default)]
    pub task_hash: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub ai_reasoning: Option<String>,
}

/// Body of a task creation request. Unset fields take server defaults.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub address: String,
    pub token_balance: f64,
    pub created_at: String,
    pub last_login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardReceipt {
    pub amount: u64,
    pub credited: bool,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub task: Task,
    /// `client` or `relay`.
    pub mode: String,
    #[serde(default)]
    pub reward: Option<RewardReceipt>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnChainTask {
    pub exists: bool,
    pub completed: bool,
    pub hash: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub task_id: String,
    pub task_hash: String,
    pub on_chain: OnChainTask,
    pub matches: bool,
}
