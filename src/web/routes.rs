//! Web API router construction.

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::web::{jobs, status};

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/sync/{target}", post(jobs::trigger))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/scheduler/start", post(jobs::start_scheduler))
        .route("/scheduler/stop", post(jobs::stop_scheduler))
        .with_state(app_state);

    Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .layer(request_timeout(REQUEST_TIMEOUT))
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Requests running longer than `timeout` are answered with `408 Request Timeout`.
fn request_timeout(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}
