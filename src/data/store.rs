//! Storage seam used by the reconciler.

use crate::data::models::{
    FiberClientRecord, MacUpdate, Onu, OnuIdentity, OnuKey, PortOccupancy, SfpDiagnostics,
    SlotInventory, SystemInfo, TemperatureSensor,
};
use anyhow::Result;
use async_trait::async_trait;

/// Counts from a correlation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagCounts {
    pub matched: u64,
    pub cleared: u64,
}

/// Persistent tables for synchronized device data.
///
/// Every `replace_*` method deletes the rows in scope and inserts the new set in a single
/// transaction, and returns the number of rows inserted.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn replace_port_occupancy(&self, rows: &[PortOccupancy]) -> Result<u64>;

    /// Replace the ONUs of one PON port only.
    async fn replace_port_onus(&self, pon_path: &str, onus: &[Onu]) -> Result<u64>;

    async fn onu_identities(&self) -> Result<Vec<OnuIdentity>>;

    /// Set the MAC of existing ONUs, returning the number of rows updated.
    async fn update_onu_macs(&self, updates: &[MacUpdate]) -> Result<u64>;

    async fn upsert_system_info(&self, info: &SystemInfo) -> Result<()>;

    async fn replace_slots(&self, slots: &[SlotInventory]) -> Result<u64>;

    async fn replace_temperatures(&self, sensors: &[TemperatureSensor]) -> Result<u64>;

    async fn replace_sfp_diagnostics(&self, rows: &[SfpDiagnostics]) -> Result<u64>;

    async fn upsert_fiber_clients(&self, clients: &[FiberClientRecord]) -> Result<u64>;

    /// `(mac_key, name)` of every stored client.
    async fn fiber_client_keys(&self) -> Result<Vec<(String, String)>>;

    /// Mark `matched` ONUs as fiber clients and every other ONU as not, atomically.
    async fn apply_fiber_flags(&self, matched: &[OnuKey]) -> Result<FlagCounts>;
}
