use super::Service;
use crate::cli::ServiceName;
use crate::state::{ServiceStatus, ServiceStatusRegistry};
use crate::sync::worker::Worker;
use crate::sync::{JobQueue, Scheduler, SyncContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Runs the job workers and, when enabled, the scheduler.
pub struct SyncService {
    queue: JobQueue,
    scheduler: Scheduler,
    context: Arc<SyncContext>,
    worker_count: usize,
    job_timeout: Duration,
    scheduler_enabled: bool,
    service_statuses: ServiceStatusRegistry,
    worker_handles: Vec<JoinHandle<()>>,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

impl SyncService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: JobQueue,
        scheduler: Scheduler,
        context: Arc<SyncContext>,
        worker_count: usize,
        job_timeout: Duration,
        scheduler_enabled: bool,
        service_statuses: ServiceStatusRegistry,
    ) -> Self {
        Self {
            queue,
            scheduler,
            context,
            worker_count,
            job_timeout,
            scheduler_enabled,
            service_statuses,
            worker_handles: Vec::new(),
            shutdown_tx: None,
        }
    }

    fn spawn_workers(&mut self) {
        let (shutdown_tx, _) = broadcast::channel(1);
        for id in 0..self.worker_count.max(1) {
            let worker = Worker::new(
                id,
                self.queue.clone(),
                self.context.clone(),
                self.job_timeout,
            );
            let shutdown_rx = shutdown_tx.subscribe();
            self.worker_handles
                .push(tokio::spawn(async move { worker.run(shutdown_rx).await }));
        }
        self.shutdown_tx = Some(shutdown_tx);
        info!(worker_count = self.worker_handles.len(), "Spawned job workers");
    }
}

#[async_trait::async_trait]
impl Service for SyncService {
    fn name(&self) -> &'static str {
        ServiceName::Sync.as_str()
    }

    async fn run(&mut self) -> Result<(), anyhow::Error> {
        self.service_statuses
            .set(self.name(), ServiceStatus::Starting);
        self.spawn_workers();
        if self.scheduler_enabled {
            self.scheduler.start();
        } else {
            info!("Scheduler disabled by configuration");
        }
        self.service_statuses.set(self.name(), ServiceStatus::Active);

        // Workers only return on shutdown; the manager drops this future when it arrives.
        futures::future::join_all(self.worker_handles.iter_mut()).await;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        self.scheduler.stop().await;
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.queue.close();

        for handle in self.worker_handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = ?e, "Worker task failed");
            }
        }
        self.service_statuses
            .set(self.name(), ServiceStatus::Disabled);
        Ok(())
    }
}
