//! HTTP entrypoint: a tiny axum server exposing the job-dispatch endpoint
//! the external orchestrator calls to trigger indexing or PR review, plus
//! a liveness probe.

pub mod core;
pub mod error_handler;
pub mod middleware_layer;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use core::app_state::AppState;
use core::config::AppConfig;
use core::http::response_envelope::ApiResponse;
use error_handler::AppError;
use middleware_layer::json_extractor::json_error_mapper;

async fn method_not_allowed() -> Response {
    ApiResponse::<()>::error("METHOD_NOT_ALLOWED", "method not allowed", vec![])
        .into_response_with_status(StatusCode::METHOD_NOT_ALLOWED)
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(routes::job::handle_job))
        .route("/health", get(routes::health::health))
        .fallback(method_not_allowed)
        .layer(middleware::from_fn(json_error_mapper))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Loads configuration, builds shared state, and serves the router until
/// the process is killed.
pub async fn start() -> Result<(), AppError> {
    let cfg = AppConfig::from_env()?;
    let port = cfg.port;
    let state = Arc::new(AppState::new(&cfg)?);

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting http server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(AppError::Bind)?;

    axum::serve(listener, app).await.map_err(AppError::Server)?;

    Ok(())
}
