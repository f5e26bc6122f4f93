//! The fixed multi-step full synchronization.

use crate::sync::SyncError;
use crate::sync::collectors::CollectReport;
use crate::sync::jobs::JobId;
use crate::sync::queue::JobQueue;
use crate::utils::fmt_duration;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStep {
    Init,
    SystemInfo,
    Ports,
    Onus,
    Mac,
    ClientCorrelation,
    Done,
    Failed,
}

impl SyncStep {
    /// The working steps, in execution order.
    pub const ORDER: [SyncStep; 5] = [
        SyncStep::SystemInfo,
        SyncStep::Ports,
        SyncStep::Onus,
        SyncStep::Mac,
        SyncStep::ClientCorrelation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStep::Init => "INIT",
            SyncStep::SystemInfo => "SYSTEM_INFO",
            SyncStep::Ports => "PORTS",
            SyncStep::Onus => "ONUS",
            SyncStep::Mac => "MAC",
            SyncStep::ClientCorrelation => "CLIENT_CORRELATION",
            SyncStep::Done => "DONE",
            SyncStep::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executes one step of the sequence.
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run_step(&self, step: SyncStep) -> Result<Vec<CollectReport>, SyncError>;
}

/// Runs every step in order inside one job, recording progress in the job metadata.
///
/// Steps are independent: a failed step is recorded and the next one still runs. The
/// job fails at the end if any step failed.
pub struct Sequencer {
    runner: Arc<dyn StepRunner>,
    queue: JobQueue,
}

impl Sequencer {
    pub fn new(runner: Arc<dyn StepRunner>, queue: JobQueue) -> Self {
        Self { runner, queue }
    }

    pub async fn run(&self, job_id: JobId) -> Result<(), SyncError> {
        let start = Instant::now();
        self.queue.set_current_step(job_id, SyncStep::Init);
        let mut failures = Vec::new();

        for step in SyncStep::ORDER {
            self.queue.step_started(job_id, step);
            let step_start = Instant::now();

            match self.runner.run_step(step).await {
                Ok(reports) => {
                    for report in reports {
                        self.queue.add_report(job_id, report);
                    }
                    self.queue.step_finished(job_id, step, None);
                    info!(
                        %step,
                        duration = fmt_duration(step_start.elapsed()),
                        "Step finished"
                    );
                }
                Err(mut e) => {
                    for report in e.take_completed() {
                        self.queue.add_report(job_id, report);
                    }
                    let message = e.to_string();
                    error!(%step, error = %message, "Step failed, continuing with next step");
                    self.queue.step_finished(job_id, step, Some(message.clone()));
                    failures.push(format!("{step}: {message}"));
                }
            }
        }

        let outcome = if failures.is_empty() {
            SyncStep::Done
        } else {
            SyncStep::Failed
        };
        self.queue.set_current_step(job_id, outcome);
        info!(
            %outcome,
            failed_steps = failures.len(),
            duration = fmt_duration(start.elapsed()),
            "Full synchronization complete"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SyncError::StepsFailed(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::Category;
    use crate::device::DeviceError;
    use crate::sync::jobs::{JobType, StepStatus};
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<SyncStep>>,
        fail: Option<SyncStep>,
    }

    #[async_trait]
    impl StepRunner for Recorder {
        async fn run_step(&self, step: SyncStep) -> Result<Vec<CollectReport>, SyncError> {
            self.seen.lock().unwrap().push(step);
            if Some(step) == self.fail {
                return Err(DeviceError::Closed.into());
            }
            Ok(vec![CollectReport::new(Category::Slots)])
        }
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let queue = JobQueue::default();
        let id = queue.enqueue(JobType::FullSync, "scheduler").unwrap();
        let runner = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            fail: None,
        });

        Sequencer::new(runner.clone(), queue.clone())
            .run(id)
            .await
            .unwrap();

        assert_eq!(*runner.seen.lock().unwrap(), SyncStep::ORDER.to_vec());
        let job = queue.get(id).unwrap();
        assert_eq!(job.current_step, Some(SyncStep::Done));
        assert_eq!(job.reports.len(), 5);
        let starts: Vec<_> = job.steps.iter().map(|s| s.started_at).collect();
        assert!(starts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_failed_step_does_not_stop_sequence() {
        let queue = JobQueue::default();
        let id = queue.enqueue(JobType::FullSync, "alice").unwrap();
        let runner = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            fail: Some(SyncStep::Ports),
        });

        let err = Sequencer::new(runner.clone(), queue.clone())
            .run(id)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::StepsFailed(ref f) if f.len() == 1));
        assert_eq!(runner.seen.lock().unwrap().len(), 5);

        let job = queue.get(id).unwrap();
        assert_eq!(job.current_step, Some(SyncStep::Failed));
        let statuses: Vec<_> = job.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![
                StepStatus::Succeeded,
                StepStatus::Failed,
                StepStatus::Succeeded,
                StepStatus::Succeeded,
                StepStatus::Succeeded,
            ]
        );
    }
}
