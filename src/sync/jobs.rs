//! Job identities, kinds and the metadata kept for each queued job.

use crate::data::models::PonPort;
use crate::sync::collectors::CollectReport;
use crate::sync::sequencer::SyncStep;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Names accepted by [`JobType::from_target`].
pub const TARGETS: &[&str] = &[
    "full",
    "system_info",
    "slots",
    "temperatures",
    "sfp",
    "ports",
    "onus",
    "mac",
    "clients",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Ulid);

impl JobId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// What a job does when a worker picks it up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobType {
    /// The whole multi-step sequence.
    FullSync,
    /// Version, uptime, slots, temperatures and SFP diagnostics.
    SystemInfo,
    Slots,
    Temperatures,
    Sfp,
    PortOccupancy,
    /// Every configured port, or only `port`.
    Onus {
        #[serde(skip_serializing_if = "Option::is_none")]
        port: Option<PonPort>,
    },
    MacAddresses,
    FiberClients,
}

impl JobType {
    /// Resolve a trigger target name, e.g. the `{target}` of `POST /api/sync/{target}`.
    pub fn from_target(target: &str, port: Option<PonPort>) -> Result<Self, String> {
        let job = match target {
            "full" | "full_sync" => JobType::FullSync,
            "system" | "system_info" => JobType::SystemInfo,
            "slots" => JobType::Slots,
            "temperatures" => JobType::Temperatures,
            "sfp" => JobType::Sfp,
            "ports" | "port_occupancy" => JobType::PortOccupancy,
            "onus" => return Ok(JobType::Onus { port }),
            "mac" | "mac_addresses" => JobType::MacAddresses,
            "clients" | "fiber_clients" => JobType::FiberClients,
            other => {
                return Err(format!(
                    "unknown sync target {other:?}, expected one of: {}",
                    TARGETS.join(", ")
                ));
            }
        };
        match port {
            Some(_) => Err(format!("target {target:?} does not take a port")),
            None => Ok(job),
        }
    }

    pub fn function(&self) -> &'static str {
        match self {
            JobType::FullSync => "sync.full",
            JobType::SystemInfo => "collect.system_info",
            JobType::Slots => "collect.slots",
            JobType::Temperatures => "collect.temperatures",
            JobType::Sfp => "collect.sfp",
            JobType::PortOccupancy => "collect.port_occupancy",
            JobType::Onus { .. } => "collect.onus",
            JobType::MacAddresses => "collect.mac_addresses",
            JobType::FiberClients => "collect.fiber_clients",
        }
    }

    pub fn label(&self) -> String {
        match self {
            JobType::FullSync => "Full synchronization".to_string(),
            JobType::SystemInfo => "System information".to_string(),
            JobType::Slots => "Slot inventory".to_string(),
            JobType::Temperatures => "Temperature sensors".to_string(),
            JobType::Sfp => "SFP diagnostics".to_string(),
            JobType::PortOccupancy => "Port occupancy".to_string(),
            JobType::Onus { port: None } => "ONU status".to_string(),
            JobType::Onus { port: Some(port) } => format!("ONU status of {port}"),
            JobType::MacAddresses => "MAC addresses".to_string(),
            JobType::FiberClients => "Fiber client correlation".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Started,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Succeeded,
    Failed,
}

/// Start, finish and outcome of one sequence step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: SyncStep,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: JobType,
    pub function: &'static str,
    /// `scheduler` or the user that triggered the job.
    pub initiator: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub current_step: Option<SyncStep>,
    pub status: JobStatus,
    pub error: Option<String>,
    pub steps: Vec<StepRecord>,
    pub reports: Vec<CollectReport>,
}

impl JobRecord {
    pub fn new(id: JobId, job_type: JobType, initiator: impl Into<String>) -> Self {
        Self {
            id,
            function: job_type.function(),
            label: job_type.label(),
            job_type,
            initiator: initiator.into(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            current_step: None,
            status: JobStatus::Queued,
            error: None,
            steps: Vec::new(),
            reports: Vec::new(),
        }
    }
}
