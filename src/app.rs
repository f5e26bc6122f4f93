use crate::cli::ServiceName;
use crate::config::Config;
use crate::data::{PgStore, SyncStore};
use crate::device::{DeviceGuard, TelnetSessionFactory};
use crate::feed::{ClientFeed, HttpFeed};
use crate::reconcile::Reconciler;
use crate::services::manager::ServiceManager;
use crate::services::sync::SyncService;
use crate::services::web::WebService;
use crate::state::AppState;
use crate::sync::collectors::{CommandTimeouts, PortLayout};
use crate::sync::{JobQueue, Scheduler, SyncContext};
use crate::utils::fmt_duration;
use anyhow::Context;
use sqlx::ConnectOptions;
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
    context: Arc<SyncContext>,
    service_manager: ServiceManager,
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub async fn new() -> Result<Self, anyhow::Error> {
        let config = Config::load().context("Failed to load config")?;

        let slow_threshold = Duration::from_millis(500);
        let connect_options = sqlx::postgres::PgConnectOptions::from_str(&config.database_url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(4)
            .acquire_slow_threshold(slow_threshold)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            min_connections = 0,
            max_connections = 4,
            acquire_timeout = "4s",
            acquire_slow_threshold = fmt_duration(slow_threshold),
            "database pool established"
        );

        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        let store: Arc<dyn SyncStore> = Arc::new(PgStore::new(db_pool));
        let device = DeviceGuard::new(
            Arc::new(TelnetSessionFactory::new(config.olt.clone())),
            config.olt.acquire_timeout,
        );

        let feed: Option<Arc<dyn ClientFeed>> = match &config.feed {
            Some(feed_config) => Some(Arc::new(
                HttpFeed::new(feed_config.clone()).context("Failed to create client feed")?,
            )),
            None => {
                info!("No client feed configured; correlation uses stored clients only");
                None
            }
        };

        let context = Arc::new(SyncContext {
            device: device.clone(),
            reconciler: Reconciler::new(store),
            feed,
            layout: PortLayout::from(&config.olt),
            timeouts: CommandTimeouts::from(&config.olt),
        });

        let queue = JobQueue::default();
        let scheduler = Scheduler::new(queue.clone(), config.sync_interval);
        let app_state = AppState::new(queue, scheduler, device);

        info!(
            olt = %config.olt.host,
            ports = context.layout.ports().count(),
            sync_interval = fmt_duration(config.sync_interval),
            workers = config.worker_count,
            "Sync pipeline configured"
        );

        Ok(App {
            config,
            app_state,
            context,
            service_manager: ServiceManager::new(),
        })
    }

    /// Setup and register services based on enabled service list
    pub fn setup_services(&mut self, services: &[ServiceName]) -> Result<(), anyhow::Error> {
        if services.contains(&ServiceName::Web) {
            let web_service = Box::new(WebService::new(self.config.port, self.app_state.clone()));
            self.service_manager
                .register_service(ServiceName::Web.as_str(), web_service);
        }

        if services.contains(&ServiceName::Sync) {
            let sync_service = Box::new(SyncService::new(
                self.app_state.queue.clone(),
                self.app_state.scheduler.clone(),
                self.context.clone(),
                self.config.worker_count,
                self.config.job_timeout,
                self.config.scheduler_enabled,
                self.app_state.service_statuses.clone(),
            ));
            self.service_manager
                .register_service(ServiceName::Sync.as_str(), sync_service);
        }

        if !self.service_manager.has_services() {
            error!("No services enabled. Cannot start application.");
            return Err(anyhow::anyhow!("No services enabled"));
        }

        Ok(())
    }

    /// Start all registered services
    pub fn start_services(&mut self) {
        self.service_manager.spawn_all();
    }

    /// Run the application and handle shutdown signals
    pub async fn run(self) -> ExitCode {
        use crate::services::signals::handle_shutdown_signals;
        handle_shutdown_signals(self.service_manager, self.config.shutdown_timeout).await
    }
}
