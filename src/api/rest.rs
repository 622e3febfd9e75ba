//! Axum REST API handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::Json,
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::dispatch::{DispatchError, RawRequest, Reply, Request};
use crate::service::InteractService;

use super::dto::*;

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<InteractService>,
    pub start_time: Instant,
}

type ApiResult = Result<Json<Reply>, (StatusCode, Json<ErrorResponse>)>;

/// Create the REST API router
pub fn create_rest_router(state: Arc<AppState>, body_limit_mb: usize) -> Router {
    Router::new()
        // Dispatch endpoints
        .route("/api/network/", post(network_handler))
        .route("/api/s2m/", post(s2m_handler))
        .route("/api/fbrs/", post(fbrs_handler))
        // System endpoints
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit_mb * 1024 * 1024)) // frames are sent inline
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP status for a dispatch fault
fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::MalformedRequest(_) | DispatchError::InvalidArguments { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        DispatchError::UnknownMethod { .. } => StatusCode::NOT_FOUND,
        DispatchError::Uninitialized { .. } => StatusCode::CONFLICT,
        DispatchError::Construction { .. } | DispatchError::Invocation { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: DispatchError) -> (StatusCode, Json<ErrorResponse>) {
    (status_for(&err), Json(ErrorResponse::new(&err.to_string(), err.code())))
}

fn parse(endpoint: &str, raw: RawRequest) -> Result<Request, (StatusCode, Json<ErrorResponse>)> {
    Request::try_from(raw).map_err(|e| {
        error!("Rejected {} request: {}", endpoint, e);
        error_response(e)
    })
}

/// Segmentation core: attribute reads, construction and method calls
async fn network_handler(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<RawRequest>,
) -> ApiResult {
    let request = parse("network", raw)?;
    state.service.network(request).await.map(Json).map_err(error_response)
}

/// Stroke-to-mask controller
async fn s2m_handler(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<RawRequest>,
) -> ApiResult {
    let request = parse("s2m", raw)?;
    state.service.s2m(request).await.map(Json).map_err(error_response)
}

/// Click refinement controller
async fn fbrs_handler(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<RawRequest>,
) -> ApiResult {
    let request = parse("fbrs", raw)?;
    state.service.fbrs(request).await.map(Json).map_err(error_response)
}

/// Health check
async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Json<HealthResponse> {
    let health = state.service.health();

    Json(HealthResponse {
        healthy: health.healthy,
        version: health.version,
        handles: health
            .handles
            .into_iter()
            .map(|(name, h)| (name, HandleDto {
                initialized: h.initialized,
                methods: h.methods,
            }))
            .collect(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
