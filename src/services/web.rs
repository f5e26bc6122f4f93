use super::Service;
use crate::cli::ServiceName;
use crate::state::{AppState, ServiceStatus};
use crate::web::create_router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, trace, warn};

/// Web server service implementation
pub struct WebService {
    port: u16,
    app_state: AppState,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

impl WebService {
    pub fn new(port: u16, app_state: AppState) -> Self {
        Self {
            port,
            app_state,
            shutdown_tx: None,
        }
    }
}

#[async_trait::async_trait]
impl Service for WebService {
    fn name(&self) -> &'static str {
        ServiceName::Web.as_str()
    }

    async fn run(&mut self) -> Result<(), anyhow::Error> {
        let app = create_router(self.app_state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.app_state
                    .service_statuses
                    .set_error(self.name(), format!("failed to bind {addr}: {e}"));
                return Err(e.into());
            }
        };
        self.app_state
            .service_statuses
            .set(self.name(), ServiceStatus::Active);
        info!(
            service = "web",
            address = %addr,
            link = format!("http://localhost:{}", addr.port()),
            "web server listening"
        );

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                trace!(service = "web", "Graceful shutdown signal received");
            })
            .await?;

        info!(service = "web", "Web server stopped");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        } else {
            warn!(service = "web", "No shutdown channel found");
        }
        self.app_state
            .service_statuses
            .set(self.name(), ServiceStatus::Disabled);
        Ok(())
    }
}
