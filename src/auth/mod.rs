//! Wallet-based authentication.
//!
//! # Data Flow
//! ```text
//! POST /api/auth/login {walletAddress}
//!     → parse_wallet_address
//!     → JwtKeys::issue (HS256, `address` claim, 7-day expiry)
//!
//! Authorization: Bearer <token>
//!     → AuthUser extractor
//!     → JwtKeys::verify
//!     → owner Address for every task and user operation
//! ```

pub mod extract;
pub mod jwt;

pub use extract::AuthUser;
pub use jwt::{Claims, JwtKeys};

use alloy::primitives::Address;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Failed to issue token: {0}")]
    Issue(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            AuthError::Issue(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            AuthError::MissingToken => "Authentication required".to_string(),
            AuthError::InvalidToken(_) => "Invalid token".to_string(),
            AuthError::InvalidAddress(_) => "Invalid wallet address".to_string(),
            AuthError::Issue(_) => "Login failed".to_string(),
        }
    }
}

/// Parse a `0x`-prefixed 20-byte hex wallet address.
pub fn parse_wallet_address(raw: &str) -> Result<Address, AuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidAddress("Wallet address is required".to_string()));
    }
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(AuthError::InvalidAddress(trimmed.to_string()));
    }
    trimmed
        .parse::<Address>()
        .map_err(|_| AuthError::InvalidAddress(trimmed.to_string()))
}
