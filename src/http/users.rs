//! Profile and token balance routes.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::http::response::ApiJson;
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct BalanceAdjustment {
    pub amount: f64,
}

pub async fn me(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
) -> AppResult<Json<Value>> {
    let user = state.users.profile(&owner)?;
    Ok(Json(json!({ "user": user })))
}

pub async fn balance(State(state): State<AppState>, AuthUser(owner): AuthUser) -> Json<Value> {
    Json(json!({ "balance": state.users.balance(&owner) }))
}

pub async fn adjust_balance(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    ApiJson(body): ApiJson<BalanceAdjustment>,
) -> AppResult<Json<Value>> {
    let user = state.users.adjust_balance(&owner, body.amount)?;
    Ok(Json(json!({ "user": user })))
}
