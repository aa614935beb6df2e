//! `GET /health`.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub ledger: &'static str,
    pub ledger_healthy: bool,
    pub tasks: usize,
}

/// 200 when the ledger is reachable, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let ledger = state.verifier.ledger();
    let ledger_healthy = ledger.is_healthy().await;
    let status = if ledger_healthy { "ok" } else { "degraded" };
    let code = if ledger_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthStatus {
            status,
            version: env!("CARGO_PKG_VERSION"),
            ledger: ledger.name(),
            ledger_healthy,
            tasks: state.store.task_count(),
        }),
    )
}
