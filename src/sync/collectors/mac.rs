use super::{CollectReport, SyncContext};
use crate::data::models::Category;
use crate::parsers::fdb::parse_forwarding_table;
use crate::sync::SyncError;

/// The whole bridge-port forwarding database; large on a busy OLT.
const FDB_COMMAND: &str = "show vlan bridge-port-fdb";

impl SyncContext {
    pub async fn collect_mac_addresses(&self) -> Result<CollectReport, SyncError> {
        let raw = self.scrape(FDB_COMMAND, &self.timeouts.long()).await?;
        let parsed = parse_forwarding_table(&raw)?;
        let written = self.reconciler.mac_addresses(&parsed.records).await?;
        Ok(CollectReport::from_parsed(
            Category::MacAddresses,
            &parsed,
            written,
        ))
    }
}
