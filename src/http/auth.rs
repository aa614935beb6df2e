//! `POST /api/auth/login`.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::error::AppResult;
use crate::http::response::ApiJson;
use crate::http::server::AppState;
use crate::users::LoginResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub wallet_address: String,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    Ok(Json(state.users.login(&body.wallet_address)?))
}
