use crate::services::ServiceResult;
use crate::services::manager::ServiceManager;
use crate::utils::fmt_duration;
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// Handle application shutdown signals and graceful shutdown
pub async fn handle_shutdown_signals(
    mut service_manager: ServiceManager,
    shutdown_timeout: Duration,
) -> ExitCode {
    // Set up signal handling for both SIGINT (Ctrl+C) and SIGTERM
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = ?e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
        info!("Received ctrl+c, gracefully shutting down...");
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, gracefully shutting down...");
            }
            Err(e) => {
                error!(error = ?e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    // Wait for either a signal or a service to complete
    let mut exit_code = ExitCode::SUCCESS;
    tokio::select! {
        (service_name, result) = service_manager.run() => {
            match result {
                ServiceResult::GracefulShutdown => {
                    info!(service = service_name, "Service completed gracefully");
                }
                ServiceResult::NormalCompletion => {
                    warn!(service = service_name, "Service completed unexpectedly");
                    exit_code = ExitCode::FAILURE;
                }
                ServiceResult::Error(e) => {
                    error!(service = service_name, error = ?e, "Service failed");
                    exit_code = ExitCode::FAILURE;
                }
            }
        }
        _ = ctrl_c => {}
        _ = sigterm => {}
    }

    match service_manager.shutdown(shutdown_timeout).await {
        Ok(elapsed) => {
            info!(
                remaining = fmt_duration(shutdown_timeout.saturating_sub(elapsed)),
                "Graceful shutdown complete"
            );
        }
        Err(pending) => {
            warn!(
                pending_services = ?pending,
                timeout = fmt_duration(shutdown_timeout),
                "Graceful shutdown elapsed, some services did not stop"
            );
            exit_code = ExitCode::FAILURE;
        }
    }

    info!(exit_code = ?exit_code, "Application shutdown complete");
    exit_code
}
