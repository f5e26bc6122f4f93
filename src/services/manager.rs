use crate::services::{Service, ServiceResult, run_service};
use crate::utils::fmt_duration;
use futures::future::select_all;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Manages multiple services and their lifecycle
pub struct ServiceManager {
    registered_services: HashMap<String, Box<dyn Service>>,
    running_services: HashMap<String, JoinHandle<ServiceResult>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            registered_services: HashMap::new(),
            running_services: HashMap::new(),
            shutdown_tx,
        }
    }

    /// Register a service to be managed (not yet spawned)
    pub fn register_service(&mut self, name: &str, service: Box<dyn Service>) {
        self.registered_services.insert(name.to_string(), service);
    }

    /// Check if there are any registered services
    pub fn has_services(&self) -> bool {
        !self.registered_services.is_empty()
    }

    /// Spawn all registered services
    pub fn spawn_all(&mut self) {
        let service_count = self.registered_services.len();
        let service_names: Vec<_> = self.registered_services.keys().cloned().collect();

        for (name, service) in self.registered_services.drain() {
            let shutdown_rx = self.shutdown_tx.subscribe();
            let handle = tokio::spawn(run_service(service, shutdown_rx));
            trace!(service = name, id = ?handle.id(), "Service spawned");
            self.running_services.insert(name, handle);
        }

        info!(
            service_count,
            services = ?service_names,
            "Spawned {} services",
            service_count
        );
    }

    /// Run all services until one completes or fails.
    /// Returns the first service that completes and its result.
    pub async fn run(&mut self) -> (String, ServiceResult) {
        if self.running_services.is_empty() {
            return (
                "none".to_string(),
                ServiceResult::Error(anyhow::anyhow!("No services to run")),
            );
        }

        info!(
            "ServiceManager running {} services",
            self.running_services.len()
        );

        let names: Vec<String> = self.running_services.keys().cloned().collect();
        let (result, index, still_running) = select_all(self.running_services.values_mut()).await;
        drop(still_running);
        let completed = names[index].clone();
        self.running_services.remove(&completed);

        match result {
            Ok(service_result) => (completed, service_result),
            Err(e) => (
                completed,
                ServiceResult::Error(anyhow::anyhow!("Task panic: {e}")),
            ),
        }
    }

    /// Shutdown all services gracefully with a timeout.
    ///
    /// Returns the elapsed time on success, or the names of services that did not stop in
    /// time.
    pub async fn shutdown(&mut self, timeout: Duration) -> Result<Duration, Vec<String>> {
        let service_count = self.running_services.len();
        info!(
            service_count,
            timeout = fmt_duration(timeout),
            "Shutting down services"
        );

        let start = Instant::now();
        let _ = self.shutdown_tx.send(());

        let handles: Vec<(String, JoinHandle<ServiceResult>)> =
            self.running_services.drain().collect();
        let mut pending = Vec::new();

        for (name, handle) in handles {
            let remaining = timeout.saturating_sub(start.elapsed());
            match tokio::time::timeout(remaining, handle).await {
                Ok(Ok(ServiceResult::Error(e))) => {
                    warn!(service = name, error = ?e, "Service stopped with an error");
                }
                Ok(Ok(_)) => debug!(service = name, "Service stopped"),
                Ok(Err(e)) => warn!(service = name, error = ?e, "Service task failed"),
                Err(_) => {
                    warn!(service = name, "Service did not stop before the deadline");
                    pending.push(name);
                }
            }
        }

        if pending.is_empty() {
            let elapsed = start.elapsed();
            info!(
                service_count,
                elapsed = fmt_duration(elapsed),
                "Services shutdown completed"
            );
            Ok(elapsed)
        } else {
            Err(pending)
        }
    }
}
