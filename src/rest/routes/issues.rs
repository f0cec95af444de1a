//! Detected issue endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::audit::parse_id;
use crate::rest::dto::{IssueResponse, IssuesQuery, UpdateIssueRequest};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;

/// List detected issues, optionally for a single run
#[utoipa::path(
    get,
    path = "/api/v1/issues",
    tag = "Issues",
    params(IssuesQuery),
    responses(
        (status = 200, description = "Detected issues, most severe first", body = Vec<IssueResponse>),
        (status = 404, description = "Run not found", body = ErrorResponse)
    )
)]
pub async fn list(
    State(state): State<ApiState>,
    Query(query): Query<IssuesQuery>,
) -> Result<Json<Vec<IssueResponse>>, ApiError> {
    let store = state.controller.store();
    let issues = match query.audit_run_id {
        Some(run_id) => {
            store.get_run(run_id).await?;
            store.issues_for_run(run_id).await?
        }
        None => store.all_issues().await?,
    };
    Ok(Json(issues.iter().map(IssueResponse::from).collect()))
}

/// Mark an issue resolved or unresolved
#[utoipa::path(
    put,
    path = "/api/v1/issues/{id}",
    tag = "Issues",
    params(
        ("id" = String, Path, description = "Issue id")
    ),
    request_body = UpdateIssueRequest,
    responses(
        (status = 200, description = "Issue updated", body = IssueResponse),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Issue not found", body = ErrorResponse)
    )
)]
pub async fn update(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateIssueRequest>,
) -> Result<Json<IssueResponse>, ApiError> {
    let issue_id = parse_id(&id, "issue")?;
    let issue = state
        .controller
        .store()
        .set_issue_resolved(issue_id, request.is_resolved)
        .await?;

    tracing::info!(issue_id = %issue.id, resolved = issue.is_resolved, "Issue updated");
    Ok(Json(IssueResponse::from(&issue)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::testing::{scripted_state, BLOCKED_INPUT_LINES};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_list_and_resolve() {
        let state = scripted_state();
        let run_id = state.controller.start_run().await.unwrap();
        state.controller.wait(run_id).await.unwrap();

        let query = IssuesQuery {
            audit_run_id: Some(run_id),
        };
        let issues = list(State(state.clone()), Query(query)).await.unwrap();
        assert_eq!(issues.len(), BLOCKED_INPUT_LINES.len());
        assert!(issues.iter().all(|i| !i.is_resolved));

        let id = issues[0].id.to_string();
        let updated = update(
            State(state.clone()),
            Path(id),
            Json(UpdateIssueRequest { is_resolved: true }),
        )
        .await
        .unwrap();
        assert!(updated.is_resolved);

        let all = list(State(state), Query(IssuesQuery { audit_run_id: None }))
            .await
            .unwrap();
        assert_eq!(all.iter().filter(|i| i.is_resolved).count(), 1);
    }

    #[tokio::test]
    async fn test_list_for_unknown_run() {
        let query = IssuesQuery {
            audit_run_id: Some(Uuid::new_v4()),
        };
        let result = list(State(scripted_state()), Query(query)).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_unknown_issue() {
        let result = update(
            State(scripted_state()),
            Path(Uuid::new_v4().to_string()),
            Json(UpdateIssueRequest { is_resolved: true }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
