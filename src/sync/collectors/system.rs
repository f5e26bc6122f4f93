use super::{CollectReport, SyncContext};
use crate::data::models::Category;
use crate::parsers::{sfp, slots, system, temperature};
use crate::sync::SyncError;
use tracing::info;

const VERSION_COMMAND: &str = "show software-mngt version etsi";
const UPTIME_COMMAND: &str = "show core1-uptime";
const SLOTS_COMMAND: &str = "show equipment slot";
const TEMPERATURE_COMMAND: &str = "show equipment temperature";
const SFP_COMMAND: &str = "show equipment diagnostics sfp detail";

impl SyncContext {
    pub async fn collect_system_info(&self) -> Result<CollectReport, SyncError> {
        let options = self.timeouts.normal();
        let mut session = self.device.open().await?;
        let version = session.send_command(VERSION_COMMAND, &options).await;
        let uptime = match &version {
            Ok(_) => Some(session.send_command(UPTIME_COMMAND, &options).await),
            Err(_) => None,
        };
        session.close().await;

        let version = version?;
        let uptime = uptime.transpose()?.unwrap_or_default();
        let info = system::parse_system_info(&version, &uptime)?;
        info!(
            release = info.software_release.as_deref().unwrap_or("unknown"),
            uptime_parsed = info.uptime.parsed,
            "Collected system information"
        );

        let written = self.reconciler.system_info(&info).await?;
        Ok(CollectReport {
            records: 1,
            written,
            ..CollectReport::new(Category::SystemInfo)
        })
    }

    pub async fn collect_slots(&self) -> Result<CollectReport, SyncError> {
        let raw = self.scrape(SLOTS_COMMAND, &self.timeouts.normal()).await?;
        let parsed = slots::parse_slots(&raw)?;
        let written = self.reconciler.slots(&parsed.records).await?;
        Ok(CollectReport::from_parsed(Category::Slots, &parsed, written))
    }

    pub async fn collect_temperatures(&self) -> Result<CollectReport, SyncError> {
        let raw = self
            .scrape(TEMPERATURE_COMMAND, &self.timeouts.normal())
            .await?;
        let parsed = temperature::parse_temperatures(&raw)?;
        let written = self.reconciler.temperatures(&parsed.records).await?;
        Ok(CollectReport::from_parsed(
            Category::Temperatures,
            &parsed,
            written,
        ))
    }

    pub async fn collect_sfp(&self) -> Result<CollectReport, SyncError> {
        let raw = self.scrape(SFP_COMMAND, &self.timeouts.long()).await?;
        let parsed = sfp::parse_sfp_diagnostics(&raw)?;
        let written = self.reconciler.sfp_diagnostics(&parsed.records).await?;
        Ok(CollectReport::from_parsed(Category::Sfp, &parsed, written))
    }
}
