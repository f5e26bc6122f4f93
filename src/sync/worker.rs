use crate::sync::SyncError;
use crate::sync::collectors::SyncContext;
use crate::sync::jobs::{JobId, JobType};
use crate::sync::queue::JobQueue;
use crate::sync::sequencer::Sequencer;
use crate::utils::fmt_duration;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time;
use tracing::{Instrument, debug, error, info, warn};

const SLOW_JOB_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// A single worker instance.
///
/// Each worker runs in its own task and takes jobs from the shared queue in FIFO order.
pub struct Worker {
    id: usize,
    queue: JobQueue,
    context: Arc<SyncContext>,
    job_timeout: Duration,
}

impl Worker {
    pub fn new(id: usize, queue: JobQueue, context: Arc<SyncContext>, job_timeout: Duration) -> Self {
        Self {
            id,
            queue,
            context,
            job_timeout,
        }
    }

    /// Runs the worker's main loop.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(worker_id = self.id, "Worker started");

        loop {
            let (job_id, job_type) = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(worker_id = self.id, "Worker received shutdown signal, exiting gracefully");
                    break;
                }
                next = self.queue.next() => match next {
                    Some(job) => job,
                    None => {
                        info!(worker_id = self.id, "Job queue closed, worker exiting");
                        break;
                    }
                }
            };

            let start = Instant::now();
            let result = tokio::select! {
                _ = shutdown_rx.recv() => {
                    warn!(worker_id = self.id, %job_id, "Shutdown received during job processing");
                    self.queue.fail(job_id, SyncError::Shutdown.to_string());
                    break;
                }
                result = self.process_job(job_id, &job_type) => result,
            };

            self.handle_job_result(job_id, &job_type, result, start.elapsed());
        }
    }

    async fn process_job(&self, job_id: JobId, job_type: &JobType) -> Result<(), SyncError> {
        let span = tracing::info_span!(
            "process_job",
            %job_id,
            function = job_type.function()
        );

        async move {
            debug!(worker_id = self.id, "Processing job");
            match time::timeout(self.job_timeout, self.execute(job_id, job_type)).await {
                Ok(result) => result,
                Err(_elapsed) => Err(SyncError::Timeout(self.job_timeout)),
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, job_id: JobId, job_type: &JobType) -> Result<(), SyncError> {
        if *job_type == JobType::FullSync {
            return Sequencer::new(self.context.clone(), self.queue.clone())
                .run(job_id)
                .await;
        }

        let (reports, result) = match self.context.run_job(job_type).await {
            Ok(reports) => (reports, Ok(())),
            Err(mut e) => (e.take_completed(), Err(e)),
        };
        for report in reports {
            self.queue.add_report(job_id, report);
        }
        result
    }

    fn handle_job_result(
        &self,
        job_id: JobId,
        job_type: &JobType,
        result: Result<(), SyncError>,
        duration: Duration,
    ) {
        if duration > SLOW_JOB_THRESHOLD {
            warn!(
                worker_id = self.id,
                %job_id,
                duration = fmt_duration(duration),
                "Slow job processing detected"
            );
        }

        match result {
            Ok(()) => {
                info!(
                    worker_id = self.id,
                    %job_id,
                    function = job_type.function(),
                    duration = fmt_duration(duration),
                    "Job completed"
                );
                self.queue.finish(job_id);
            }
            Err(e) => {
                error!(
                    worker_id = self.id,
                    %job_id,
                    function = job_type.function(),
                    duration = fmt_duration(duration),
                    error = %e,
                    "Job failed"
                );
                self.queue.fail(job_id, e.to_string());
            }
        }
    }
}
