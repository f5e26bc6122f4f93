use crate::data::models::Category;
use crate::device::DeviceError;
use crate::feed::FeedError;
use crate::parsers::ParseError;
use crate::sync::collectors::CollectReport;
use crate::sync::jobs::JobId;
use crate::utils::fmt_duration;
use std::time::Duration;
use thiserror::Error;

/// Failure of a collector, a sequence step or a whole job.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The storage write failed and its transaction was rolled back.
    #[error("failed to write {category}: {source:#}")]
    Reconcile {
        category: Category,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("{} step(s) failed: {}", .0.len(), .0.join("; "))]
    StepsFailed(Vec<String>),
    /// Some collectors of a multi-collector step failed; the others still wrote.
    #[error("{} collector(s) failed: {}", .failures.len(), .failures.join("; "))]
    Partial {
        completed: Vec<CollectReport>,
        failures: Vec<String>,
    },
    #[error("job timed out after {}", fmt_duration(*.0))]
    Timeout(Duration),
    #[error("interrupted by shutdown")]
    Shutdown,
}

impl SyncError {
    /// Reports of the collectors that succeeded before this error was returned.
    pub fn take_completed(&mut self) -> Vec<CollectReport> {
        match self {
            SyncError::Partial { completed, .. } => std::mem::take(completed),
            _ => Vec::new(),
        }
    }
}

/// Why a job could not be queued.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("a full synchronization is already queued or running ({job_id})")]
    SyncInProgress { job_id: JobId },
    #[error("job queue is closed")]
    QueueClosed,
}
