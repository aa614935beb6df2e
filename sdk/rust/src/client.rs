use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::types::{ChainStatus, LoginResponse, NewTask, Task, User, VerifyResponse};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("API returned {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("Not logged in")]
    NotLoggedIn,
}

impl ClientError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status(),
            ClientError::NotLoggedIn => None,
        }
    }
}

#[derive(Deserialize)]
struct TaskEnvelope {
    task: Task,
}

#[derive(Deserialize)]
struct TasksEnvelope {
    tasks: Vec<Task>,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Deserialize)]
struct BalanceEnvelope {
    balance: f64,
}

pub struct MomentumClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl MomentumClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Use an existing session token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Log in with a wallet address and keep the returned token.
    pub async fn login(&mut self, wallet_address: &str) -> Result<LoginResponse, ClientError> {
        let req = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "walletAddress": wallet_address }));
        let login: LoginResponse = send(req).await?;
        self.token = Some(login.token.clone());
        Ok(login)
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let envelope: TasksEnvelope = send(self.authed(self.client.get(self.url("/api/tasks")))?).await?;
        Ok(envelope.tasks)
    }

    /// List tasks with a `status` and/or `taskType` filter.
    pub async fn list_tasks_filtered(
        &self,
        status: Option<&str>,
        task_type: Option<&str>,
    ) -> Result<Vec<Task>, ClientError> {
        let mut query = Vec::new();
        if let Some(status) = status {
            query.push(("status", status));
        }
        if let Some(task_type) = task_type {
            query.push(("taskType", task_type));
        }
        let req = self.client.get(self.url("/api/tasks")).query(&query);
        let envelope: TasksEnvelope = send(self.authed(req)?).await?;
        Ok(envelope.tasks)
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task, ClientError> {
        let req = self.client.post(self.url("/api/tasks")).json(task);
        let envelope: TaskEnvelope = send(self.authed(req)?).await?;
        Ok(envelope.task)
    }

    pub async fn get_task(&self, id: &str) -> Result<Task, ClientError> {
        let req = self.client.get(self.url(&format!("/api/tasks/{id}")));
        let envelope: TaskEnvelope = send(self.authed(req)?).await?;
        Ok(envelope.task)
    }

    /// Partial update; `patch` holds the camelCase fields to change.
    pub async fn update_task(&self, id: &str, patch: Value) -> Result<Task, ClientError> {
        let mut body = patch;
        if let Value::Object(map) = &mut body {
            map.insert("id".to_string(), Value::String(id.to_string()));
        }
        let req = self.client.put(self.url("/api/tasks")).json(&body);
        let envelope: TaskEnvelope = send(self.authed(req)?).await?;
        Ok(envelope.task)
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), ClientError> {
        let req = self.client.delete(self.url(&format!("/api/tasks/{id}")));
        let _: Value = send(self.authed(req)?).await?;
        Ok(())
    }

    pub async fn complete_task(&self, id: &str) -> Result<Task, ClientError> {
        let req = self.client.post(self.url(&format!("/api/tasks/{id}/complete")));
        let envelope: TaskEnvelope = send(self.authed(req)?).await?;
        Ok(envelope.task)
    }

    /// Verify a task. With `tx_hash` the server checks that transaction;
    /// without it the server relays the ledger writes itself.
    pub async fn verify_task(
        &self,
        id: &str,
        tx_hash: Option<&str>,
        task_hash: Option<&str>,
    ) -> Result<VerifyResponse, ClientError> {
        let mut body = serde_json::Map::new();
        if let Some(tx_hash) = tx_hash {
            body.insert("txHash".to_string(), Value::String(tx_hash.to_string()));
        }
        if let Some(task_hash) = task_hash {
            body.insert("taskHash".to_string(), Value::String(task_hash.to_string()));
        }
        let req = self
            .client
            .post(self.url(&format!("/api/tasks/{id}/verify")))
            .json(&Value::Object(body));
        send(self.authed(req)?).await
    }

    pub async fn chain_status(&self, id: &str) -> Result<ChainStatus, ClientError> {
        let req = self.client.get(self.url(&format!("/api/tasks/{id}/chain")));
        send(self.authed(req)?).await
    }

    pub async fn profile(&self) -> Result<User, ClientError> {
        let req = self.client.get(self.url("/api/users/me"));
        let envelope: UserEnvelope = send(self.authed(req)?).await?;
        Ok(envelope.user)
    }

    pub async fn balance(&self) -> Result<f64, ClientError> {
        let req = self.client.get(self.url("/api/users/me/balance"));
        let envelope: BalanceEnvelope = send(self.authed(req)?).await?;
        Ok(envelope.balance)
    }

    pub async fn adjust_balance(&self, amount: f64) -> Result<User, ClientError> {
        let req = self
            .client
            .post(self.url("/api/users/me/balance"))
            .json(&json!({ "amount": amount }));
        let envelope: UserEnvelope = send(self.authed(req)?).await?;
        Ok(envelope.user)
    }

    /// Raw `/health` body. Non-2xx answers are returned, not raised.
    pub async fn health(&self) -> Result<(StatusCode, Value), ClientError> {
        let resp = self.client.get(self.url("/health")).send().await?;
        let status = resp.status();
        Ok((status, resp.json().await?))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NotLoggedIn)?;
        Ok(req.bearer_auth(token))
    }
}

async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientError> {
    let resp = req.send().await?;
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(text);
        return Err(ClientError::Api { status, message });
    }

    serde_json::from_str(&text).map_err(|e| ClientError::Api {
        status,
        message: format!("Unexpected response body: {}", e),
    })
}
