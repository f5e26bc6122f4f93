//! One collector per category: open a guarded session, scrape, parse, reconcile.
//!
//! Every collector closes its session on all exit paths before returning.

mod clients;
mod mac;
mod onus;
mod ports;
mod system;

use crate::config::OltConfig;
use crate::data::models::{Category, PonPort, Strategy};
use crate::device::{CommandOptions, DeviceGuard};
use crate::feed::ClientFeed;
use crate::parsers::Parsed;
use crate::reconcile::Reconciler;
use crate::sync::SyncError;
use crate::sync::jobs::JobType;
use crate::sync::sequencer::{StepRunner, SyncStep};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Outcome of one collector run, kept in the job metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectReport {
    pub category: Category,
    pub strategy: Strategy,
    /// Records produced by the parser.
    pub records: usize,
    /// Rows inserted or updated in the store.
    pub written: u64,
    pub skipped: usize,
    /// Ports whose command timed out or produced no output.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_units: Vec<String>,
}

impl CollectReport {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            strategy: category.strategy(),
            records: 0,
            written: 0,
            skipped: 0,
            failed_units: Vec::new(),
        }
    }

    fn from_parsed<T>(category: Category, parsed: &Parsed<T>, written: u64) -> Self {
        Self {
            records: parsed.records.len(),
            skipped: parsed.skipped.len(),
            written,
            ..Self::new(category)
        }
    }
}

/// The rack/shelf and slot/port ranges scanned by per-port collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLayout {
    pub rack: u8,
    pub shelf: u8,
    pub first_slot: u8,
    pub last_slot: u8,
    pub first_port: u8,
    pub last_port: u8,
}

impl PortLayout {
    pub fn ports(&self) -> impl Iterator<Item = PonPort> + '_ {
        (self.first_slot..=self.last_slot).flat_map(move |slot| {
            (self.first_port..=self.last_port)
                .map(move |port| PonPort::new(self.rack, self.shelf, slot, port))
        })
    }
}

impl From<&OltConfig> for PortLayout {
    fn from(config: &OltConfig) -> Self {
        Self {
            rack: config.rack,
            shelf: config.shelf,
            first_slot: config.first_slot,
            last_slot: config.last_slot,
            first_port: config.first_port,
            last_port: config.last_port,
        }
    }
}

/// Default and long per-command timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTimeouts {
    pub command: Duration,
    /// For commands that dump large tables.
    pub slow: Duration,
    pub port_prompt: Option<String>,
}

impl CommandTimeouts {
    fn normal(&self) -> CommandOptions {
        CommandOptions::with_timeout(self.command)
    }

    fn long(&self) -> CommandOptions {
        CommandOptions::with_timeout(self.slow)
    }

    fn port_status(&self) -> CommandOptions {
        match &self.port_prompt {
            Some(prompt) => self.normal().expecting(prompt.as_str()),
            None => self.normal(),
        }
    }
}

impl From<&OltConfig> for CommandTimeouts {
    fn from(config: &OltConfig) -> Self {
        Self {
            command: config.command_timeout,
            slow: config.slow_command_timeout,
            port_prompt: config.port_prompt.clone(),
        }
    }
}

/// Everything a collector needs.
pub struct SyncContext {
    pub device: DeviceGuard,
    pub reconciler: Reconciler,
    pub feed: Option<Arc<dyn ClientFeed>>,
    pub layout: PortLayout,
    pub timeouts: CommandTimeouts,
}

impl SyncContext {
    /// Run a single-category job. Full synchronizations go through the sequencer.
    pub async fn run_job(&self, job: &JobType) -> Result<Vec<CollectReport>, SyncError> {
        match job {
            JobType::FullSync => Ok(Vec::new()),
            JobType::SystemInfo => self.collect_system_step().await,
            JobType::Slots => Ok(vec![self.collect_slots().await?]),
            JobType::Temperatures => Ok(vec![self.collect_temperatures().await?]),
            JobType::Sfp => Ok(vec![self.collect_sfp().await?]),
            JobType::PortOccupancy => Ok(vec![self.collect_port_occupancy().await?]),
            JobType::Onus { port } => Ok(vec![self.collect_onus(*port).await?]),
            JobType::MacAddresses => Ok(vec![self.collect_mac_addresses().await?]),
            JobType::FiberClients => Ok(vec![self.collect_fiber_clients().await?]),
        }
    }

    /// Version and uptime, then slots, temperatures and SFP diagnostics.
    ///
    /// Every collector runs even when an earlier one failed; the reports of those that
    /// succeeded travel with the error.
    pub async fn collect_system_step(&self) -> Result<Vec<CollectReport>, SyncError> {
        let results = [
            (Category::SystemInfo, self.collect_system_info().await),
            (Category::Slots, self.collect_slots().await),
            (Category::Temperatures, self.collect_temperatures().await),
            (Category::Sfp, self.collect_sfp().await),
        ];

        let mut completed = Vec::new();
        let mut failures = Vec::new();
        for (category, result) in results {
            match result {
                Ok(report) => completed.push(report),
                Err(e) => {
                    warn!(
                        %category,
                        error = %e,
                        "Collector failed, continuing with the rest of the step"
                    );
                    failures.push(format!("{category}: {e}"));
                }
            }
        }

        if failures.is_empty() {
            Ok(completed)
        } else {
            Err(SyncError::Partial {
                completed,
                failures,
            })
        }
    }

    /// Open a session, send one command and close the session again.
    async fn scrape(&self, command: &str, options: &CommandOptions) -> Result<String, SyncError> {
        let mut session = self.device.open().await?;
        let result = session.send_command(command, options).await;
        session.close().await;
        Ok(result?)
    }
}

#[async_trait]
impl StepRunner for SyncContext {
    async fn run_step(&self, step: SyncStep) -> Result<Vec<CollectReport>, SyncError> {
        match step {
            SyncStep::SystemInfo => self.collect_system_step().await,
            SyncStep::Ports => Ok(vec![self.collect_port_occupancy().await?]),
            SyncStep::Onus => Ok(vec![self.collect_onus(None).await?]),
            SyncStep::Mac => Ok(vec![self.collect_mac_addresses().await?]),
            SyncStep::ClientCorrelation => Ok(vec![self.collect_fiber_clients().await?]),
            SyncStep::Init | SyncStep::Done | SyncStep::Failed => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_iterates_slots_then_ports() {
        let layout = PortLayout {
            rack: 1,
            shelf: 1,
            first_slot: 1,
            last_slot: 2,
            first_port: 1,
            last_port: 2,
        };
        let ports: Vec<String> = layout.ports().map(|p| p.to_string()).collect();
        assert_eq!(ports, vec!["1/1/1/1", "1/1/1/2", "1/1/2/1", "1/1/2/2"]);
    }

    #[test]
    fn test_empty_range() {
        let layout = PortLayout {
            rack: 1,
            shelf: 1,
            first_slot: 3,
            last_slot: 2,
            first_port: 1,
            last_port: 16,
        };
        assert_eq!(layout.ports().count(), 0);
    }

    #[test]
    fn test_port_status_uses_port_prompt_when_configured() {
        let mut timeouts = CommandTimeouts {
            command: Duration::from_secs(5),
            slow: Duration::from_secs(60),
            port_prompt: None,
        };
        assert_eq!(timeouts.port_status(), timeouts.normal());

        timeouts.port_prompt = Some("typ:isadmin>#".into());
        let options = timeouts.port_status();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.expect_prompt.as_deref(), Some("typ:isadmin>#"));
    }
}
