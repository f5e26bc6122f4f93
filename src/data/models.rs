//! Records produced by the parsers and persisted by the store.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address of one PON port: `rack/shelf/slot/port`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PonPort {
    pub rack: u8,
    pub shelf: u8,
    pub slot: u8,
    pub port: u8,
}

impl PonPort {
    pub fn new(rack: u8, shelf: u8, slot: u8, port: u8) -> Self {
        Self {
            rack,
            shelf,
            slot,
            port,
        }
    }
}

impl fmt::Display for PonPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.rack, self.shelf, self.slot, self.port)
    }
}

impl FromStr for PonPort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .trim()
            .split('/')
            .map(|p| p.parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| format!("invalid PON port {s:?}"))?;
        match parts.as_slice() {
            [rack, shelf, slot, port] => Ok(Self::new(*rack, *shelf, *slot, *port)),
            _ => Err(format!("invalid PON port {s:?}: expected rack/shelf/slot/port")),
        }
    }
}

impl TryFrom<String> for PonPort {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PonPort> for String {
    fn from(value: PonPort) -> Self {
        value.to_string()
    }
}

/// Number of ONUs attached to one PON port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortOccupancy {
    pub slot: u8,
    pub port: u8,
    pub connected_users: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Up,
    Down,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Up => "up",
            LinkState::Down => "down",
        }
    }
}

impl FromStr for LinkState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(LinkState::Up),
            "down" => Ok(LinkState::Down),
            _ => Err(()),
        }
    }
}

/// Identity of an ONU: PON path plus position on that PON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OnuKey {
    pub pon_path: String,
    pub position: u8,
}

impl fmt::Display for OnuKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pon_path, self.position)
    }
}

/// An optical network unit as reported by the ONT status table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Onu {
    pub pon_path: String,
    pub position: u8,
    pub mac: Option<String>,
    pub serial: String,
    pub admin_state: LinkState,
    pub oper_state: LinkState,
    pub rx_signal_dbm: Option<f64>,
    pub distance_m: Option<u32>,
    pub description1: String,
    pub description2: String,
    pub is_fiber_client: bool,
}

impl Onu {
    pub fn key(&self) -> OnuKey {
        OnuKey {
            pon_path: self.pon_path.clone(),
            position: self.position,
        }
    }
}

/// The fields of a stored ONU that enrichment passes match against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnuIdentity {
    pub key: OnuKey,
    pub serial: String,
    pub description1: String,
}

/// One learned entry of the bridge-port forwarding table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacObservation {
    pub pon_prefix: String,
    pub position: u8,
    pub mac: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacUpdate {
    pub key: OnuKey,
    pub mac: String,
}

/// A client record from the billing feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiberClientRecord {
    /// Matched against the ONU serial number.
    pub mac_key: String,
    /// Matched against the ONU's first description.
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Uptime {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub raw: String,
    pub parsed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub software_release: Option<String>,
    pub uptime: Uptime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInventory {
    pub slot_name: String,
    pub card_type: String,
    pub enabled: bool,
    pub error_status: String,
    pub availability: String,
    pub restart_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemperatureStatus {
    Normal,
    WarningLow,
    WarningHigh,
    CriticalLow,
    CriticalHigh,
}

impl TemperatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureStatus::Normal => "NORMAL",
            TemperatureStatus::WarningLow => "WARNING_LOW",
            TemperatureStatus::WarningHigh => "WARNING_HIGH",
            TemperatureStatus::CriticalLow => "CRITICAL_LOW",
            TemperatureStatus::CriticalHigh => "CRITICAL_HIGH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureSensor {
    pub slot_name: String,
    pub sensor_id: u32,
    pub actual_c: f64,
    pub warn_low: f64,
    pub warn_high: f64,
    pub shutdown_low: f64,
    pub shutdown_high: f64,
}

impl TemperatureSensor {
    /// Classify the reading against its thresholds, shutdown limits first.
    pub fn status(&self) -> TemperatureStatus {
        if self.actual_c >= self.shutdown_high {
            TemperatureStatus::CriticalHigh
        } else if self.actual_c <= self.shutdown_low {
            TemperatureStatus::CriticalLow
        } else if self.actual_c >= self.warn_high {
            TemperatureStatus::WarningHigh
        } else if self.actual_c <= self.warn_low {
            TemperatureStatus::WarningLow
        } else {
            TemperatureStatus::Normal
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SfpDiagnostics {
    pub interface: String,
    pub vendor_name: Option<String>,
    pub part_number: Option<String>,
    pub serial_number: Option<String>,
    pub temperature_c: Option<f64>,
    pub voltage_v: Option<f64>,
    pub tx_power_dbm: Option<f64>,
    pub rx_power_dbm: Option<f64>,
}

/// How a category's records are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Delete every existing row in scope, then insert the new set, in one transaction.
    ReplaceAll,
    /// Update or insert by identity key; rows not in the input are left alone.
    UpsertByKey,
}

/// The kinds of data synchronized from the device and the client feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    PortOccupancy,
    Onus,
    MacAddresses,
    SystemInfo,
    Slots,
    Temperatures,
    Sfp,
    #[value(skip)]
    FiberClients,
}

impl Category {
    pub fn strategy(&self) -> Strategy {
        match self {
            Category::PortOccupancy
            | Category::Onus
            | Category::Slots
            | Category::Temperatures
            | Category::Sfp => Strategy::ReplaceAll,
            Category::MacAddresses | Category::SystemInfo | Category::FiberClients => {
                Strategy::UpsertByKey
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::PortOccupancy => "port_occupancy",
            Category::Onus => "onus",
            Category::MacAddresses => "mac_addresses",
            Category::SystemInfo => "system_info",
            Category::Slots => "slots",
            Category::Temperatures => "temperatures",
            Category::Sfp => "sfp",
            Category::FiberClients => "fiber_clients",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
