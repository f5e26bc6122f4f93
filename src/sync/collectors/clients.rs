use super::{CollectReport, SyncContext};
use crate::data::models::Category;
use crate::sync::SyncError;
use tracing::info;

impl SyncContext {
    /// Refresh fiber clients from the feed, then flag matching ONUs.
    ///
    /// Without a configured feed the stored client list is correlated as is.
    pub async fn collect_fiber_clients(&self) -> Result<CollectReport, SyncError> {
        let mut report = CollectReport::new(Category::FiberClients);

        match &self.feed {
            Some(feed) => {
                let clients = feed.fetch_all().await?;
                report.records = clients.len();
                self.reconciler.fiber_clients(clients).await?;
            }
            None => info!("No client feed configured, correlating stored clients"),
        }

        let counts = self.reconciler.correlate_fiber_clients().await?;
        report.written = counts.matched + counts.cleared;
        Ok(report)
    }
}
