//! Health and status handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::trace;

use crate::state::{AppState, ServiceReport, ServiceStatus};
use crate::sync::JobId;
use crate::sync::scheduler::SchedulerStatus;

#[derive(Serialize)]
pub struct StatusResponse {
    status: ServiceStatus,
    version: String,
    commit: String,
    services: BTreeMap<&'static str, ServiceReport>,
    scheduler: SchedulerStatus,
    queue_depth: usize,
    full_sync: Option<JobId>,
    device_busy: bool,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Service, scheduler, queue and device status
pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.service_statuses.overall(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_HASH").to_string(),
        services: state.service_statuses.snapshot(),
        scheduler: state.scheduler.status(),
        queue_depth: state.queue.depth(),
        full_sync: state.queue.full_run(),
        device_busy: state.device.is_busy(),
    })
}
