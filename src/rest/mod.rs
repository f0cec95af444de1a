//! REST API and WebSocket feed for the audit dashboard.
//!
//! Exposes run control, polling endpoints and the push feed over one router.
//! Both transports read the same store, so a client that misses pushed events
//! can always catch up by polling.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::ApiState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the API router with all routes
pub fn build_router(state: ApiState) -> Router {
    let cors = cors_layer(&state.config.rest_api.cors_origins);

    Router::new()
        // Health endpoints
        .route("/api/v1/health", get(routes::health::health))
        .route("/api/v1/status", get(routes::health::status))
        // Audit endpoints
        .route("/api/v1/audit/steps", get(routes::audit::steps))
        .route("/api/v1/audit/start", post(routes::audit::start))
        .route("/api/v1/audit/runs", get(routes::audit::list_runs))
        .route("/api/v1/audit/runs/:id", get(routes::audit::get_run))
        .route(
            "/api/v1/audit/runs/:id/progress",
            get(routes::audit::progress),
        )
        // Issue endpoints
        .route("/api/v1/issues", get(routes::issues::list))
        .route("/api/v1/issues/:id", put(routes::issues::update))
        // Dashboard endpoints
        .route("/api/v1/dashboard/summary", get(routes::dashboard::summary))
        // Push feed
        .route("/api/v1/ws", get(routes::ws::feed))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the REST API server and run until Ctrl-C
pub async fn serve(state: ApiState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind REST API to {}", addr))?;
    tracing::info!("REST API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down REST API");
        })
        .await?;

    Ok(())
}
