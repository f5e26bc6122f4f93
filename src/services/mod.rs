use tokio::sync::broadcast;
use tracing::{error, info, warn};

pub mod manager;
pub mod signals;
pub mod sync;
pub mod web;

#[derive(Debug)]
pub enum ServiceResult {
    GracefulShutdown,
    NormalCompletion,
    Error(anyhow::Error),
}

/// Common trait for all services in the application
#[async_trait::async_trait]
pub trait Service: Send + Sync {
    /// The name of the service for logging
    fn name(&self) -> &'static str;

    /// Run the service's main work loop
    async fn run(&mut self) -> Result<(), anyhow::Error>;

    /// Gracefully shutdown the service
    ///
    /// Implementations should initiate shutdown and MUST wait for all subtasks to complete
    /// before returning.
    async fn shutdown(&mut self) -> Result<(), anyhow::Error>;
}

/// Generic service runner that handles the lifecycle
pub async fn run_service(
    mut service: Box<dyn Service>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> ServiceResult {
    let name = service.name();
    info!(service = name, "Service started");

    tokio::select! {
        result = service.run() => match result {
            Ok(()) => {
                warn!(service = name, "Service completed unexpectedly");
                ServiceResult::NormalCompletion
            }
            Err(e) => {
                error!(service = name, error = ?e, "Service failed");
                ServiceResult::Error(e)
            }
        },
        _ = shutdown_rx.recv() => {
            info!(service = name, "Shutting down service");
            match service.shutdown().await {
                Ok(()) => {
                    info!(service = name, "Service shutdown completed");
                    ServiceResult::GracefulShutdown
                }
                Err(e) => {
                    error!(service = name, error = ?e, "Service shutdown failed");
                    ServiceResult::Error(e)
                }
            }
        }
    }
}
