//! Login and token balances.

use alloy::primitives::Address;
use chrono::{SubsecRound, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{parse_wallet_address, JwtKeys};
use crate::error::{AppError, AppResult};
use crate::storage::Store;
use crate::users::model::User;

/// Response of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

pub struct UserService {
    store: Arc<Store>,
    jwt: Arc<JwtKeys>,
}

impl UserService {
    pub fn new(store: Arc<Store>, jwt: Arc<JwtKeys>) -> Self {
        Self { store, jwt }
    }

    /// Validate the address, upsert the user and issue a session token.
    pub fn login(&self, wallet_address: &str) -> AppResult<LoginResponse> {
        let address = parse_wallet_address(wallet_address)?;
        let token = self.jwt.issue(&address)?;
        let user = self.store.record_login(address, Utc::now().trunc_subsecs(3));
        tracing::info!(address = %address, "User logged in");
        Ok(LoginResponse { token, user })
    }

    pub fn profile(&self, owner: &Address) -> AppResult<User> {
        self.store.get_user(owner).ok_or(AppError::NotFound("User"))
    }

    /// Current balance; zero for addresses that never logged in.
    pub fn balance(&self, owner: &Address) -> f64 {
        self.store
            .get_user(owner)
            .map(|u| u.token_balance)
            .unwrap_or(0.0)
    }

    /// Add `amount` (possibly negative) to the user's balance.
    pub fn adjust_balance(&self, owner: &Address, amount: f64) -> AppResult<User> {
        if !amount.is_finite() {
            return Err(AppError::Validation("Amount must be a finite number".to_string()));
        }
        let user = self
            .store
            .adjust_balance(owner, amount)
            .ok_or(AppError::NotFound("User"))?;
        tracing::debug!(address = %owner, amount, balance = user.token_balance, "Balance adjusted");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn service() -> UserService {
        UserService::new(
            Arc::new(Store::in_memory()),
            Arc::new(JwtKeys::new("test-secret-at-least-16-bytes", 3600)),
        )
    }

    #[test]
    fn test_login_upserts_and_issues_token() {
        let svc = service();
        let first = svc.login(WALLET).unwrap();
        assert_eq!(first.user.token_balance, 0.0);

        let second = svc.login(WALLET).unwrap();
        assert_eq!(second.user.created_at, first.user.created_at);
        assert!(second.user.last_login >= first.user.last_login);
        assert_eq!(svc.jwt.verify_address(&second.token).unwrap(), first.user.address);
    }

    #[test]
    fn test_login_rejects_bad_address() {
        let err = service().login("not-a-wallet").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_balance_defaults_to_zero() {
        assert_eq!(service().balance(&Address::repeat_byte(9)), 0.0);
    }

    #[test]
    fn test_adjust_balance() {
        let svc = service();
        let user = svc.login(WALLET).unwrap().user;

        svc.adjust_balance(&user.address, 10.0).unwrap();
        let updated = svc.adjust_balance(&user.address, -2.5).unwrap();
        assert_eq!(updated.token_balance, 7.5);
        assert_eq!(svc.balance(&user.address), 7.5);

        assert!(matches!(
            svc.adjust_balance(&user.address, f64::NAN),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            svc.adjust_balance(&Address::repeat_byte(9), 1.0),
            Err(AppError::NotFound(_))
        ));
    }
}
