// HTTP server for limit checks, usage status and Prometheus metrics
//
// Routes:
// - GET  /v1/limits          usage against every configured ceiling
// - POST /v1/limits/enforce  check one operation (200 / 429 / 503)
// - GET  /metrics            Prometheus scrape endpoint
// - GET  /health             liveness

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::limits::{Limits, LimitsError, OperationContext, ResourceContext, SecurityContext};
use crate::metrics;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub limits: Arc<dyn Limits>,
}

/// Body of `POST /v1/limits/enforce`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforceRequest {
    pub security: SecurityContext,
    pub operation: OperationContext,
    pub resource: ResourceContext,
}

/// Successful check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnforceResponse {
    pub allowed: bool,
}

/// Error body for non-limit failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Build the router around a limits implementation
///
/// Internal only. `POST /v1/limits/enforce` trusts the `is_admin` and
/// `is_system` flags in the request body, so the contexts must come from an
/// upstream authenticator and the listener must not be exposed to end users.
pub fn router(limits: Arc<dyn Limits>) -> Router {
    Router::new()
        .route("/v1/limits", get(limits_handler))
        .route("/v1/limits/enforce", post(enforce_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { limits })
}

/// Start the HTTP server
///
/// Runs until the listener fails or the task is cancelled.
pub async fn start_server(addr: SocketAddr, limits: Arc<dyn Limits>) -> Result<()> {
    // Already registered is fine when the server restarts in-process
    if let Err(e) = metrics::init() {
        tracing::debug!("Metrics registry already initialized: {}", e);
    }

    let app = router(limits);

    info!("Starting limits server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind limits server to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("Limits server error")?;

    Ok(())
}

async fn limits_handler(State(state): State<AppState>) -> Response {
    Json(state.limits.get_limits().await).into_response()
}

async fn enforce_handler(
    State(state): State<AppState>,
    Json(request): Json<EnforceRequest>,
) -> Response {
    let result = state
        .limits
        .enforce_limits(&request.security, &request.operation, &request.resource)
        .await;

    match result {
        Ok(()) => Json(EnforceResponse { allowed: true }).into_response(),
        Err(LimitsError::LimitExceeded(exceeded)) => {
            (StatusCode::TOO_MANY_REQUESTS, Json(exceeded)).into_response()
        }
        Err(err @ LimitsError::StoreUnavailable { .. }) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody {
                error: "store_unavailable".to_string(),
                message: err.to_string(),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Unexpected limits error: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "internal".to_string(),
                    message: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Metrics endpoint handler
async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}
