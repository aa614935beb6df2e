//! Bearer-token extractor.

use alloy::primitives::Address;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;

use crate::auth::{AuthError, JwtKeys};
use crate::error::AppError;

/// The authenticated wallet address of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Address);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<JwtKeys>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let keys = Arc::<JwtKeys>::from_ref(state);
        let address = keys.verify_address(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            e
        })?;
        Ok(AuthUser(address))
    }
}
