//! Trigger, job inspection and scheduler control handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::models::PonPort;
use crate::state::AppState;
use crate::sync::scheduler::SchedulerStatus;
use crate::sync::{JobId, JobRecord, JobType};
use crate::web::error::{ApiError, ApiErrorCode};

const DEFAULT_INITIATOR: &str = "api";

#[derive(Debug, Deserialize)]
pub struct TriggerParams {
    /// PON port for a single-port ONU refresh, e.g. `1/1/1/3`.
    pub port: Option<String>,
    /// Recorded as the job initiator.
    pub user: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub job_id: JobId,
    pub function: &'static str,
    pub label: String,
}

/// Enqueue a collector or the full sequence and return immediately.
pub(super) async fn trigger(
    State(state): State<AppState>,
    Path(target): Path<String>,
    Query(params): Query<TriggerParams>,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    let port = params
        .port
        .as_deref()
        .map(str::parse::<PonPort>)
        .transpose()
        .map_err(|e| ApiError::new(ApiErrorCode::InvalidPort, e))?;
    let job_type = JobType::from_target(&target, port)
        .map_err(|e| ApiError::new(ApiErrorCode::InvalidTarget, e))?;

    let initiator = params
        .user
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_INITIATOR.to_string());
    let response = TriggerResponse {
        function: job_type.function(),
        label: job_type.label(),
        job_id: state.queue.enqueue(job_type, initiator)?,
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

pub(super) async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobRecord>> {
    Json(state.queue.list())
}

pub(super) async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    let job_id: JobId = id
        .parse()
        .map_err(|_| ApiError::new(ApiErrorCode::InvalidJobId, format!("invalid job id {id:?}")))?;
    state
        .queue
        .get(job_id)
        .map(Json)
        .ok_or_else(|| ApiError::new(ApiErrorCode::JobNotFound, format!("job {job_id} not found")))
}

#[derive(Debug, Serialize)]
pub struct SchedulerControlResponse {
    pub changed: bool,
    pub scheduler: SchedulerStatus,
}

pub(super) async fn start_scheduler(State(state): State<AppState>) -> Json<SchedulerControlResponse> {
    let changed = state.scheduler.start();
    info!(changed, "Scheduler start requested");
    Json(SchedulerControlResponse {
        changed,
        scheduler: state.scheduler.status(),
    })
}

pub(super) async fn stop_scheduler(State(state): State<AppState>) -> Json<SchedulerControlResponse> {
    let changed = state.scheduler.stop().await;
    info!(changed, "Scheduler stop requested");
    Json(SchedulerControlResponse {
        changed,
        scheduler: state.scheduler.status(),
    })
}
