//! Health check and status endpoints.

use axum::{extract::State, Json};

use crate::rest::dto::{HealthResponse, StatusResponse};
use crate::rest::error::ApiError;
use crate::rest::state::ApiState;
use crate::types::RunStatus;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get service status with run and issue counts
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "Health",
    responses(
        (status = 200, description = "Service status with run info", body = StatusResponse)
    )
)]
pub async fn status(State(state): State<ApiState>) -> Result<Json<StatusResponse>, ApiError> {
    let controller = &state.controller;
    let runs = controller.list_runs().await?;
    let issues = controller.store().all_issues().await?;

    // Newest first, so the executing run wins over queued ones
    let active_run_id = runs
        .iter()
        .find(|r| r.status == RunStatus::Running)
        .or_else(|| runs.iter().rev().find(|r| !r.status.is_terminal()))
        .map(|r| r.id);

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        step_count: controller.registry().len(),
        run_count: runs.len(),
        active_run_id,
        issue_count: issues.len(),
        listener_count: controller.notifier().listener_count(),
    }))
}
