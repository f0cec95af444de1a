//! Dashboard summary endpoint.

use axum::{extract::State, Json};

use crate::rest::dto::{DashboardSummary, RunResponse};
use crate::rest::error::ApiError;
use crate::rest::state::ApiState;
use crate::types::{IssueSeverity, StepStatus};

/// Latest run plus issue counts across all runs
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/summary",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardSummary)
    )
)]
pub async fn summary(State(state): State<ApiState>) -> Result<Json<DashboardSummary>, ApiError> {
    let controller = &state.controller;
    let runs = controller.list_runs().await?;
    let issues = controller.store().all_issues().await?;

    let (passed_steps, failed_steps) = match runs.first() {
        Some(latest) => {
            let steps = controller.store().steps_for_run(latest.id).await?;
            let passed = steps
                .iter()
                .filter(|s| s.status == StepStatus::Success)
                .count();
            let failed = steps
                .iter()
                .filter(|s| s.status == StepStatus::Failed)
                .count();
            (passed, failed)
        }
        None => (0, 0),
    };

    Ok(Json(DashboardSummary {
        latest_run: runs.first().map(RunResponse::from),
        total_runs: runs.len(),
        total_issues: issues.len(),
        unresolved_issues: issues.iter().filter(|i| !i.is_resolved).count(),
        critical_issues: issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Critical && !i.is_resolved)
            .count(),
        passed_steps,
        failed_steps,
    }))
}
