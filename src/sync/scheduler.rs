//! Wall-clock aligned trigger for the full synchronization.

use crate::sync::jobs::{JobId, JobType};
use crate::sync::lock;
use crate::sync::queue::JobQueue;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const SCHEDULER_INITIATOR: &str = "scheduler";

/// The next multiple of `interval` since the Unix epoch strictly after `now`.
///
/// An hourly interval fires on the hour (UTC), a 15-minute one at :00, :15, :30 and :45.
pub fn next_tick(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let step = i64::try_from(interval.as_secs().max(1)).unwrap_or(i64::MAX);
    let next = (now.timestamp().div_euclid(step) + 1).saturating_mul(step);
    DateTime::from_timestamp(next, 0).unwrap_or(now + TimeDelta::seconds(step))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_job: Option<JobId>,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct State {
    task: Option<(JoinHandle<()>, CancellationToken)>,
    next_run: Option<DateTime<Utc>>,
    last_run: Option<DateTime<Utc>>,
    last_job: Option<JobId>,
    last_error: Option<String>,
}

struct Inner {
    queue: JobQueue,
    interval: Duration,
    state: Mutex<State>,
}

/// Enqueues the full synchronization at every interval boundary while started.
///
/// The scheduler only enqueues; a failed enqueue is logged and recorded, and the next tick
/// is unaffected.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(queue: JobQueue, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                interval,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Start the tick loop. Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let mut state = lock(&self.inner.state);
        if state
            .task
            .as_ref()
            .is_some_and(|(handle, _)| !handle.is_finished())
        {
            return false;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let scheduler = self.clone();
            let token = token.clone();
            async move { scheduler.tick_loop(token).await }
        });
        state.task = Some((handle, token));
        info!(
            interval_secs = self.inner.interval.as_secs(),
            "Scheduler service started"
        );
        true
    }

    /// Stop the tick loop, waiting briefly for it to exit. Returns `false` if it was not
    /// running.
    pub async fn stop(&self) -> bool {
        let task = {
            let mut state = lock(&self.inner.state);
            state.next_run = None;
            state.task.take()
        };
        let Some((handle, token)) = task else {
            return false;
        };

        token.cancel();
        if time::timeout(Duration::from_secs(5), handle).await.is_err() {
            warn!("Scheduler did not stop within 5s, abandoning");
        }
        info!("Scheduler stopped");
        true
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = lock(&self.inner.state);
        SchedulerStatus {
            running: state
                .task
                .as_ref()
                .is_some_and(|(handle, _)| !handle.is_finished()),
            interval_secs: self.inner.interval.as_secs(),
            next_run: state.next_run,
            last_run: state.last_run,
            last_job: state.last_job,
            last_error: state.last_error.clone(),
        }
    }

    async fn tick_loop(&self, token: CancellationToken) {
        loop {
            let now = Utc::now();
            let next = next_tick(now, self.inner.interval);
            lock(&self.inner.state).next_run = Some(next);
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(next_run = %next, "Scheduler waiting for next tick");

            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Scheduler tick loop cancelled");
                    break;
                }
                _ = time::sleep(wait) => self.fire(),
            }
        }
    }

    /// Enqueue one full synchronization and record the outcome.
    pub fn fire(&self) {
        let result = self
            .inner
            .queue
            .enqueue(JobType::FullSync, SCHEDULER_INITIATOR);

        let mut state = lock(&self.inner.state);
        state.last_run = Some(Utc::now());
        match result {
            Ok(job_id) => {
                info!(%job_id, "Scheduled full synchronization enqueued");
                state.last_job = Some(job_id);
                state.last_error = None;
            }
            Err(e) => {
                warn!(error = %e, "Scheduled full synchronization not enqueued");
                state.last_error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hourly_ticks_on_the_hour() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 13, 42, 7).unwrap();
        assert_eq!(
            next_tick(now, Duration::from_secs(3600)),
            Utc.with_ymd_and_hms(2026, 10, 18, 14, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_tick_on_boundary_moves_forward() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 14, 0, 0).unwrap();
        assert_eq!(
            next_tick(now, Duration::from_secs(15 * 60)),
            Utc.with_ymd_and_hms(2026, 10, 18, 14, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 14, 0, 0).unwrap();
        assert_eq!(next_tick(now, Duration::ZERO), now + TimeDelta::seconds(1));
    }

    #[tokio::test]
    async fn test_fire_records_rejected_enqueue() {
        let queue = JobQueue::default();
        let scheduler = Scheduler::new(queue.clone(), Duration::from_secs(3600));

        scheduler.fire();
        let first = scheduler.status();
        assert!(first.last_error.is_none());
        let job_id = first.last_job.unwrap();
        assert_eq!(queue.get(job_id).unwrap().initiator, "scheduler");

        scheduler.fire();
        let second = scheduler.status();
        assert!(second.last_error.unwrap().contains("already queued"));
        assert_eq!(second.last_job, Some(job_id));
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let scheduler = Scheduler::new(JobQueue::default(), Duration::from_secs(3600));
        assert!(scheduler.start());
        assert!(!scheduler.start());
        tokio::task::yield_now().await;
        assert!(scheduler.status().running);

        assert!(scheduler.stop().await);
        assert!(!scheduler.status().running);
        assert!(scheduler.status().next_run.is_none());
        assert!(!scheduler.stop().await);
    }
}
