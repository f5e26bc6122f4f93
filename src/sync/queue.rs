//! In-process FIFO job queue with per-job metadata.

use crate::sync::collectors::CollectReport;
use crate::sync::error::EnqueueError;
use crate::sync::lock;
use crate::sync::jobs::{JobId, JobRecord, JobStatus, JobType, StepRecord, StepStatus};
use crate::sync::sequencer::SyncStep;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Terminal jobs kept for inspection before the oldest are evicted.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

struct Inner {
    pending: Mutex<VecDeque<JobId>>,
    jobs: DashMap<JobId, JobRecord>,
    notify: Notify,
    closed: AtomicBool,
    /// The full synchronization that is queued or running, if any.
    full_run: Mutex<Option<JobId>>,
    history_limit: usize,
}

/// Shared handle to the job queue.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl JobQueue {
    pub fn new(history_limit: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(VecDeque::new()),
                jobs: DashMap::new(),
                notify: Notify::new(),
                closed: AtomicBool::new(false),
                full_run: Mutex::new(None),
                history_limit,
            }),
        }
    }

    /// Queue a job. A second full synchronization is rejected while one is outstanding.
    pub fn enqueue(
        &self,
        job_type: JobType,
        initiator: impl Into<String>,
    ) -> Result<JobId, EnqueueError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(EnqueueError::QueueClosed);
        }

        let id = JobId::new();
        if job_type == JobType::FullSync {
            let mut full_run = lock(&self.inner.full_run);
            if let Some(job_id) = *full_run {
                return Err(EnqueueError::SyncInProgress { job_id });
            }
            *full_run = Some(id);
        }

        let record = JobRecord::new(id, job_type, initiator);
        info!(
            job_id = %id,
            function = record.function,
            initiator = %record.initiator,
            "Job enqueued"
        );
        self.inner.jobs.insert(id, record);
        lock(&self.inner.pending).push_back(id);
        self.inner.notify.notify_waiters();
        Ok(id)
    }

    /// Wait for the next queued job and mark it started. Returns `None` once the queue
    /// is closed and drained.
    pub async fn next(&self) -> Option<(JobId, JobType)> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let popped = lock(&self.inner.pending).pop_front();
            if let Some(id) = popped {
                if let Some(mut job) = self.inner.jobs.get_mut(&id) {
                    job.status = JobStatus::Started;
                    job.started_at = Some(Utc::now());
                    return Some((id, job.job_type.clone()));
                }
                continue;
            }
            if self.inner.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    pub fn finish(&self, id: JobId) {
        self.complete(id, JobStatus::Finished, None);
    }

    pub fn fail(&self, id: JobId, error: impl Into<String>) {
        self.complete(id, JobStatus::Failed, Some(error.into()));
    }

    fn complete(&self, id: JobId, status: JobStatus, error: Option<String>) {
        match self.inner.jobs.get_mut(&id) {
            Some(mut job) => {
                job.status = status;
                job.finished_at = Some(Utc::now());
                job.error = error;
            }
            None => warn!(job_id = %id, "Completed job is not tracked"),
        }

        let mut full_run = lock(&self.inner.full_run);
        if *full_run == Some(id) {
            *full_run = None;
        }
        drop(full_run);

        self.evict();
    }

    /// Drop the oldest terminal jobs beyond the history limit.
    fn evict(&self) {
        let excess = self
            .inner
            .jobs
            .len()
            .saturating_sub(self.inner.history_limit);
        if excess == 0 {
            return;
        }

        let mut terminal: Vec<JobId> = self
            .inner
            .jobs
            .iter()
            .filter(|job| job.status.is_terminal())
            .map(|job| job.id)
            .collect();
        terminal.sort();
        for id in terminal.into_iter().take(excess) {
            self.inner.jobs.remove(&id);
        }
        debug!(excess, "Evicted finished jobs from history");
    }

    pub fn step_started(&self, id: JobId, step: SyncStep) {
        if let Some(mut job) = self.inner.jobs.get_mut(&id) {
            job.current_step = Some(step);
            job.steps.push(StepRecord {
                step,
                status: StepStatus::Running,
                started_at: Utc::now(),
                finished_at: None,
                error: None,
            });
        }
    }

    pub fn step_finished(&self, id: JobId, step: SyncStep, error: Option<String>) {
        if let Some(mut job) = self.inner.jobs.get_mut(&id)
            && let Some(record) = job.steps.iter_mut().rev().find(|s| s.step == step)
        {
            record.finished_at = Some(Utc::now());
            record.status = if error.is_some() {
                StepStatus::Failed
            } else {
                StepStatus::Succeeded
            };
            record.error = error;
        }
    }

    pub fn set_current_step(&self, id: JobId, step: SyncStep) {
        if let Some(mut job) = self.inner.jobs.get_mut(&id) {
            job.current_step = Some(step);
        }
    }

    pub fn add_report(&self, id: JobId, report: CollectReport) {
        if let Some(mut job) = self.inner.jobs.get_mut(&id) {
            job.reports.push(report);
        }
    }

    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.inner.jobs.get(&id).map(|job| job.clone())
    }

    /// Every tracked job, newest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.inner.jobs.iter().map(|j| j.clone()).collect();
        jobs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        jobs
    }

    pub fn depth(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    /// The outstanding full synchronization, if any.
    pub fn full_run(&self) -> Option<JobId> {
        *lock(&self.inner.full_run)
    }

    /// Stop accepting jobs and wake idle workers. Queued jobs are failed.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let drained: Vec<JobId> = lock(&self.inner.pending).drain(..).collect();
        for id in drained {
            self.fail(id, "queue closed before the job started");
        }
        self.inner.notify.notify_waiters();
    }
}
