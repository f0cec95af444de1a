//! Audit run endpoints: registry, start, listing, details and progress.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::audit::AuditStepKind;
use crate::rest::dto::{
    ProgressResponse, RunDetailsResponse, RunResponse, StartAuditResponse, StepInfo,
};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {} id '{}'", what, raw)))
}

/// List the audit steps in execution order
#[utoipa::path(
    get,
    path = "/api/v1/audit/steps",
    tag = "Audit",
    responses(
        (status = 200, description = "Step registry", body = Vec<StepInfo>)
    )
)]
pub async fn steps(State(state): State<ApiState>) -> Json<Vec<StepInfo>> {
    let steps = state
        .controller
        .registry()
        .iter()
        .enumerate()
        .map(|(index, name)| match AuditStepKind::from_name(name) {
            Some(kind) => StepInfo::from(kind),
            None => StepInfo {
                order: index as u32 + 1,
                name: name.clone(),
                description: String::new(),
            },
        })
        .collect();
    Json(steps)
}

/// Start a new audit run
///
/// Returns as soon as the run and its steps are recorded; progress is
/// available through polling or the WebSocket feed.
#[utoipa::path(
    post,
    path = "/api/v1/audit/start",
    tag = "Audit",
    responses(
        (status = 200, description = "Audit run started", body = StartAuditResponse),
        (status = 500, description = "Run could not be created", body = ErrorResponse)
    )
)]
pub async fn start(State(state): State<ApiState>) -> Result<Json<StartAuditResponse>, ApiError> {
    let audit_run_id = state.controller.start_run().await?;
    Ok(Json(StartAuditResponse {
        audit_run_id,
        message: "Audit started".to_string(),
    }))
}

/// List audit runs, newest first
#[utoipa::path(
    get,
    path = "/api/v1/audit/runs",
    tag = "Audit",
    responses(
        (status = 200, description = "All audit runs", body = Vec<RunResponse>)
    )
)]
pub async fn list_runs(State(state): State<ApiState>) -> Result<Json<Vec<RunResponse>>, ApiError> {
    let runs = state.controller.list_runs().await?;
    Ok(Json(runs.iter().map(RunResponse::from).collect()))
}

/// Get a run with its steps and issues
#[utoipa::path(
    get,
    path = "/api/v1/audit/runs/{id}",
    tag = "Audit",
    params(
        ("id" = String, Path, description = "Audit run id")
    ),
    responses(
        (status = 200, description = "Run details", body = RunDetailsResponse),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Run not found", body = ErrorResponse)
    )
)]
pub async fn get_run(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<RunDetailsResponse>, ApiError> {
    let run_id = parse_id(&id, "audit run")?;
    let details = state.controller.get_run_details(run_id).await?;
    Ok(Json(RunDetailsResponse::from(&details)))
}

/// Poll a run's step statuses and percent complete
#[utoipa::path(
    get,
    path = "/api/v1/audit/runs/{id}/progress",
    tag = "Audit",
    params(
        ("id" = String, Path, description = "Audit run id")
    ),
    responses(
        (status = 200, description = "Run progress", body = ProgressResponse),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Run not found", body = ErrorResponse)
    )
)]
pub async fn progress(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let run_id = parse_id(&id, "audit run")?;
    let progress = state.controller.get_progress(run_id).await?;
    Ok(Json(ProgressResponse::new(run_id, &progress)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::testing::scripted_state;

    #[tokio::test]
    async fn test_steps_lists_registry() {
        let resp = steps(State(scripted_state())).await;
        assert_eq!(resp.len(), 6);
        assert_eq!(resp[0].order, 1);
        assert_eq!(resp[5].name, "Console & Network Errors");
    }

    #[tokio::test]
    async fn test_start_then_details() {
        let state = scripted_state();
        let started = start(State(state.clone())).await.unwrap();
        let run_id = started.audit_run_id;
        state.controller.wait(run_id).await.unwrap();

        let details = get_run(State(state.clone()), Path(run_id.to_string()))
            .await
            .unwrap();
        assert_eq!(details.run.status, "completed");
        assert_eq!(details.steps.len(), 6);

        let progress = progress(State(state), Path(run_id.to_string()))
            .await
            .unwrap();
        assert_eq!(progress.percent_complete, 100);
        assert!(progress.is_complete);
    }

    #[tokio::test]
    async fn test_unknown_run_is_not_found() {
        let result = get_run(State(scripted_state()), Path(Uuid::new_v4().to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_malformed_id_is_bad_request() {
        let result = progress(State(scripted_state()), Path("not-a-uuid".to_string())).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
