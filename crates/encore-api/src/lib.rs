//! Encore API - account and authentication REST server
//!
//! Registration, email verification, login, token refresh, password reset
//! and account administration over axum, backed by PostgreSQL.

pub mod audit;
pub mod auth;
pub mod clock;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod openapi;
pub mod routes;
pub mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use axum::{response::IntoResponse, routing::get, Json, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::handlers::health;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the complete application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
