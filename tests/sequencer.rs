//! Full synchronization runs driven through the job queue and a worker.

mod helpers;

use helpers::{FailingFeed, MemoryStore, Reply, healthy_device, make_client, make_context};
use oltsync::data::models::Category;
use oltsync::sync::jobs::{JobStatus, StepStatus};
use oltsync::sync::sequencer::SyncStep;
use oltsync::sync::worker::Worker;
use oltsync::sync::{EnqueueError, JobId, JobQueue, JobRecord, JobType, SyncContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn spawn_worker(queue: &JobQueue, context: SyncContext) -> broadcast::Sender<()> {
    let worker = Worker::new(0, queue.clone(), Arc::new(context), Duration::from_secs(30));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move { worker.run(shutdown_rx).await });
    shutdown_tx
}

async fn wait_for_terminal(queue: &JobQueue, id: JobId) -> JobRecord {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(job) = queue.get(id).filter(|j| j.status.is_terminal()) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not finish in time")
}

#[tokio::test]
async fn test_full_run_executes_steps_in_order() {
    let queue = JobQueue::default();
    let store = Arc::new(MemoryStore::default());
    store.seed_clients([make_client("ALCL:B3A1C2D4", "MARIA SOUZA")]);
    let device = healthy_device();
    let _shutdown = spawn_worker(&queue, make_context(store.clone(), &device, None));

    let id = queue.enqueue(JobType::FullSync, "test").unwrap();
    let job = wait_for_terminal(&queue, id).await;

    assert_eq!(job.status, JobStatus::Finished, "error: {:?}", job.error);
    assert_eq!(job.current_step, Some(SyncStep::Done));
    let steps: Vec<SyncStep> = job.steps.iter().map(|s| s.step).collect();
    assert_eq!(steps, SyncStep::ORDER.to_vec());
    assert!(job.steps.iter().all(|s| s.status == StepStatus::Succeeded));
    for pair in job.steps.windows(2) {
        let previous_end = pair[0].finished_at.unwrap();
        assert!(pair[1].started_at >= previous_end);
    }

    let onu = store.snapshot(|t| t.onus.values().next().cloned()).unwrap();
    assert_eq!(onu.mac.as_deref(), Some("00:1a:2b:3c:4d:5e"));
    assert!(onu.is_fiber_client);
    assert_eq!(
        store.snapshot(|t| t.system.clone().and_then(|s| s.software_release)),
        Some("R6.2.04m".to_string())
    );
    assert_eq!(store.snapshot(|t| t.slots.len()), 2);
    assert_eq!(queue.full_run(), None);
}

#[tokio::test]
async fn test_failed_step_does_not_stop_the_run() {
    let queue = JobQueue::default();
    let store = Arc::new(MemoryStore::default());
    let device = healthy_device().fail("show software-mngt version etsi", Reply::Drop);
    let _shutdown = spawn_worker(&queue, make_context(store.clone(), &device, None));

    let id = queue.enqueue(JobType::FullSync, "test").unwrap();
    let job = wait_for_terminal(&queue, id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.current_step, Some(SyncStep::Failed));
    assert_eq!(job.steps.len(), SyncStep::ORDER.len());
    assert_eq!(job.steps[0].status, StepStatus::Failed);
    assert!(job.steps[1..].iter().all(|s| s.status == StepStatus::Succeeded));
    assert!(job.error.unwrap().contains("SYSTEM_INFO"));
    assert_eq!(store.snapshot(|t| t.onus.len()), 1);
}

#[tokio::test]
async fn test_second_full_run_is_rejected_until_the_first_finishes() {
    let queue = JobQueue::default();
    let store = Arc::new(MemoryStore::default());

    let first = queue.enqueue(JobType::FullSync, "scheduler").unwrap();
    assert_eq!(
        queue.enqueue(JobType::FullSync, "api"),
        Err(EnqueueError::SyncInProgress { job_id: first })
    );
    // Single-category jobs are still accepted.
    assert!(queue.enqueue(JobType::Slots, "api").is_ok());

    let _shutdown = spawn_worker(&queue, make_context(store, &healthy_device(), None));
    wait_for_terminal(&queue, first).await;

    assert!(queue.enqueue(JobType::FullSync, "api").is_ok());
}

#[tokio::test]
async fn test_single_category_job_records_its_report() {
    let queue = JobQueue::default();
    let store = Arc::new(MemoryStore::default());
    let _shutdown = spawn_worker(&queue, make_context(store.clone(), &healthy_device(), None));

    let id = queue.enqueue(JobType::Temperatures, "api").unwrap();
    let job = wait_for_terminal(&queue, id).await;

    assert_eq!(job.status, JobStatus::Finished);
    assert!(job.steps.is_empty());
    assert_eq!(job.reports.len(), 1);
    assert_eq!(job.reports[0].written, 1);
    assert_eq!(store.snapshot(|t| t.temperatures.len()), 1);
}

#[tokio::test]
async fn test_feed_failure_fails_only_the_correlation_step() {
    let queue = JobQueue::default();
    let store = Arc::new(MemoryStore::default());
    let device = healthy_device();
    let context = make_context(store.clone(), &device, Some(Arc::new(FailingFeed)));
    let _shutdown = spawn_worker(&queue, context);

    let id = queue.enqueue(JobType::FullSync, "test").unwrap();
    let job = wait_for_terminal(&queue, id).await;

    assert_eq!(job.status, JobStatus::Failed);
    let (last, rest) = job.steps.split_last().unwrap();
    assert_eq!(last.step, SyncStep::ClientCorrelation);
    assert_eq!(last.status, StepStatus::Failed);
    assert!(rest.iter().all(|s| s.status == StepStatus::Succeeded));
    assert!(job.error.unwrap().contains("HTTP 503"));

    let onu = store.snapshot(|t| t.onus.values().next().cloned()).unwrap();
    assert_eq!(onu.mac.as_deref(), Some("00:1a:2b:3c:4d:5e"));
    assert!(!onu.is_fiber_client);
}

#[tokio::test]
async fn test_system_info_job_keeps_reports_of_collectors_that_succeeded() {
    let queue = JobQueue::default();
    let store = Arc::new(MemoryStore::default());
    let device = healthy_device().fail("show equipment slot", Reply::Timeout);
    let _shutdown = spawn_worker(&queue, make_context(store.clone(), &device, None));

    let id = queue.enqueue(JobType::SystemInfo, "api").unwrap();
    let job = wait_for_terminal(&queue, id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("slots"));
    let categories: Vec<Category> = job.reports.iter().map(|r| r.category).collect();
    assert_eq!(
        categories,
        vec![Category::SystemInfo, Category::Temperatures, Category::Sfp]
    );
    assert_eq!(store.snapshot(|t| t.temperatures.len()), 1);
}
