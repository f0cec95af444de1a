//! OpenAPI specification builder using utoipa.

use utoipa::OpenApi;

use crate::rest::dto::{
    DashboardSummary, HealthResponse, IssueResponse, ProgressResponse, RunDetailsResponse,
    RunResponse, StartAuditResponse, StatusResponse, StepInfo, StepResponse, UpdateIssueRequest,
};
use crate::rest::error::ErrorResponse;

/// OpenAPI documentation for the auditor REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Auditor API",
        version = "0.1.0",
        description = "REST API for running storefront audits and reviewing their results.",
        license(name = "MIT")
    ),
    paths(
        // Health endpoints
        crate::rest::routes::health::health,
        crate::rest::routes::health::status,
        // Audit endpoints
        crate::rest::routes::audit::steps,
        crate::rest::routes::audit::start,
        crate::rest::routes::audit::list_runs,
        crate::rest::routes::audit::get_run,
        crate::rest::routes::audit::progress,
        crate::rest::routes::ws::feed,
        // Issue endpoints
        crate::rest::routes::issues::list,
        crate::rest::routes::issues::update,
        // Dashboard endpoints
        crate::rest::routes::dashboard::summary,
    ),
    components(
        schemas(
            // Response types
            HealthResponse,
            StatusResponse,
            StepInfo,
            StartAuditResponse,
            RunResponse,
            StepResponse,
            ProgressResponse,
            RunDetailsResponse,
            IssueResponse,
            DashboardSummary,
            ErrorResponse,
            // Request types
            UpdateIssueRequest,
        )
    ),
    tags(
        (name = "Health", description = "Health check and status endpoints"),
        (name = "Audit", description = "Audit runs, progress and the event feed"),
        (name = "Issues", description = "Issues detected by audit steps"),
        (name = "Dashboard", description = "Dashboard summary"),
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI specification as a JSON string
    pub fn json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }

    /// Generate the OpenAPI specification as a YAML string
    pub fn yaml() -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::json().expect("Failed to generate OpenAPI spec");
        assert!(spec.contains("Auditor API"));
        assert!(spec.contains("/api/v1/health"));
        assert!(spec.contains("/api/v1/audit/start"));
        assert!(spec.contains("/api/v1/audit/runs/{id}/progress"));
    }

    #[test]
    fn test_openapi_has_all_tags() {
        let spec = ApiDoc::json().expect("Failed to generate OpenAPI spec");
        assert!(spec.contains("\"Health\""));
        assert!(spec.contains("\"Audit\""));
        assert!(spec.contains("\"Issues\""));
        assert!(spec.contains("\"Dashboard\""));
    }

    #[test]
    fn test_openapi_yaml() {
        let yaml = ApiDoc::yaml().expect("Failed to generate YAML");
        assert!(yaml.contains("/api/v1/dashboard/summary"));
    }
}
