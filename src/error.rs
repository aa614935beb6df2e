//! Application error type and its HTTP mapping.
//!
//! Subsystem errors (`BlockchainError`, `StoreError`, `AuthError`) fold into
//! [`AppError`], which renders as `{"error": "..."}` with a status code.
//! Internal details of 5xx errors are logged, not returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::blockchain::BlockchainError;
use crate::storage::StoreError;

/// Result alias used by services and handlers.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error(transparent)]
    Blockchain(#[from] BlockchainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Blockchain(e) => match e {
                BlockchainError::NotAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                BlockchainError::Reverted(_) => StatusCode::CONFLICT,
                _ => StatusCode::BAD_GATEWAY,
            },
            AppError::Store(StoreError::DuplicateHash | StoreError::SpentHash) => {
                StatusCode::CONFLICT
            }
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth(e) => e.status(),
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client.
    fn public_message(&self) -> String {
        match self {
            AppError::Blockchain(BlockchainError::NotAvailable(_)) => {
                "Blockchain ledger unavailable".to_string()
            }
            AppError::Blockchain(BlockchainError::Reverted(reason)) => {
                format!("Transaction reverted: {}", reason)
            }
            AppError::Blockchain(_) => "Blockchain request failed".to_string(),
            AppError::Store(e @ (StoreError::DuplicateHash | StoreError::SpentHash)) => e.to_string(),
            AppError::Store(_) | AppError::Internal(_) => "Internal server error".to_string(),
            AppError::Auth(e) => e.public_message(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
