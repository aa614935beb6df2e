//! Task routes. Every handler is scoped to the bearer token's address.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::http::response::{parse_optional_body, ApiJson};
use crate::http::server::AppState;
use crate::tasks::{NewTask, TaskFilter, TaskPatch};
use crate::verification::{ChainStatus, VerifyOutcome, VerifyRequest};

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Query(filter): Query<TaskFilter>,
) -> Json<Value> {
    let tasks = state.tasks.list(&owner, &filter);
    Json(json!({ "tasks": tasks }))
}

pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    ApiJson(input): ApiJson<NewTask>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let task = state.tasks.create(owner, input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "task": task }))))
}

pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> AppResult<Json<Value>> {
    let task = state.tasks.update(&owner, patch)?;
    Ok(Json(json!({ "task": task })))
}

/// `DELETE /api/tasks?id=...`
pub async fn delete_task_by_query(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<Value>> {
    let id = query
        .id
        .ok_or_else(|| AppError::Validation("Task ID is required".to_string()))?;
    state.tasks.delete(&owner, &id)?;
    Ok(Json(json!({ "success": true })))
}

pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let task = state.tasks.get(&owner, &id)?;
    Ok(Json(json!({ "task": task })))
}

pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    state.tasks.delete(&owner, &id)?;
    Ok(Json(json!({ "success": true })))
}

pub async fn complete_task(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let task = state.tasks.complete(&owner, &id)?;
    Ok(Json(json!({ "task": task })))
}

/// Body is optional; an empty body asks for relay verification.
pub async fn verify_task(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<VerifyOutcome>> {
    let request: VerifyRequest = parse_optional_body(&body)?;
    let outcome = state.verifier.verify(owner, &id, request).await?;
    Ok(Json(outcome))
}

pub async fn chain_status(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ChainStatus>> {
    Ok(Json(state.verifier.chain_status(&owner, &id).await?))
}
