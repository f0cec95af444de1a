//! Data Transfer Objects for the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::audit::AuditStepKind;
use crate::types::{AuditProgress, AuditRun, AuditStep, DetectedIssue, RunDetails};

// =============================================================================
// Health DTOs
// =============================================================================

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Service status with run and issue counts
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub step_count: usize,
    pub run_count: usize,
    /// Run currently pending or executing, if any
    pub active_run_id: Option<Uuid>,
    pub issue_count: usize,
    pub listener_count: usize,
}

// =============================================================================
// Audit DTOs
// =============================================================================

/// Registry entry
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StepInfo {
    pub order: u32,
    pub name: String,
    pub description: String,
}

impl From<AuditStepKind> for StepInfo {
    fn from(kind: AuditStepKind) -> Self {
        Self {
            order: kind.order(),
            name: kind.name().to_string(),
            description: kind.description().to_string(),
        }
    }
}

/// Returned by `POST /audit/start` before any step runs
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartAuditResponse {
    pub audit_run_id: Uuid,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RunResponse {
    pub id: Uuid,
    /// pending, running, completed or failed
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<Object>)]
    pub results: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl From<&AuditRun> for RunResponse {
    fn from(run: &AuditRun) -> Self {
        Self {
            id: run.id,
            status: run.status.as_str().to_string(),
            started_at: run.started_at,
            completed_at: run.completed_at,
            results: run.results.clone(),
            error: run.error.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StepResponse {
    pub id: Uuid,
    pub audit_run_id: Uuid,
    pub order: u32,
    pub name: String,
    /// pending, running, success or failed
    pub status: String,
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&AuditStep> for StepResponse {
    fn from(step: &AuditStep) -> Self {
        Self {
            id: step.id,
            audit_run_id: step.run_id,
            order: step.order,
            name: step.name.clone(),
            status: step.status.as_str().to_string(),
            output: step.output.clone(),
            error_message: step.error_message.clone(),
            started_at: step.started_at,
            completed_at: step.completed_at,
        }
    }
}

/// Poll view of a run's steps
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProgressResponse {
    pub audit_run_id: Uuid,
    pub steps: Vec<StepResponse>,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub percent_complete: u8,
    pub is_complete: bool,
}

impl ProgressResponse {
    pub fn new(audit_run_id: Uuid, progress: &AuditProgress) -> Self {
        Self {
            audit_run_id,
            steps: progress.steps.iter().map(StepResponse::from).collect(),
            completed_steps: progress.completed_steps(),
            total_steps: progress.steps.len(),
            percent_complete: progress.percent_complete,
            is_complete: progress.is_complete,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RunDetailsResponse {
    pub run: RunResponse,
    pub steps: Vec<StepResponse>,
    pub issues: Vec<IssueResponse>,
}

impl From<&RunDetails> for RunDetailsResponse {
    fn from(details: &RunDetails) -> Self {
        Self {
            run: RunResponse::from(&details.run),
            steps: details.steps.iter().map(StepResponse::from).collect(),
            issues: details.issues.iter().map(IssueResponse::from).collect(),
        }
    }
}

// =============================================================================
// Issue DTOs
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssueResponse {
    pub id: Uuid,
    pub audit_run_id: Uuid,
    /// form_input, api_connection, environment or build
    pub issue_type: String,
    /// critical, high, medium or low
    pub severity: String,
    pub title: String,
    pub description: String,
    pub file_path: Option<String>,
    pub line_number: Option<u32>,
    pub recommendation: Option<String>,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&DetectedIssue> for IssueResponse {
    fn from(issue: &DetectedIssue) -> Self {
        Self {
            id: issue.id,
            audit_run_id: issue.run_id,
            issue_type: issue.kind.as_str().to_string(),
            severity: issue.severity.as_str().to_string(),
            title: issue.title.clone(),
            description: issue.description.clone(),
            file_path: issue.file_path.clone(),
            line_number: issue.line_number,
            recommendation: issue.recommendation.clone(),
            is_resolved: issue.is_resolved,
            created_at: issue.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IssuesQuery {
    /// Restrict to issues of one run
    pub audit_run_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateIssueRequest {
    pub is_resolved: bool,
}

// =============================================================================
// Dashboard DTOs
// =============================================================================

/// Headline numbers for the dashboard
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummary {
    pub latest_run: Option<RunResponse>,
    pub total_runs: usize,
    pub total_issues: usize,
    pub unresolved_issues: usize,
    pub critical_issues: usize,
    /// Step counts of the latest run
    pub passed_steps: usize,
    pub failed_steps: usize,
}
