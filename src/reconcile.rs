//! Applies parsed record sets to the store, one strategy per category.

use crate::data::{FlagCounts, SyncStore};
use crate::data::models::{
    Category, FiberClientRecord, MacObservation, MacUpdate, Onu, OnuIdentity, OnuKey, PonPort,
    PortOccupancy, SfpDiagnostics, SlotInventory, SystemInfo, TemperatureSensor,
};
use crate::sync::SyncError;
use crate::utils::log_if_slow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const SLOW_WRITE_THRESHOLD: Duration = Duration::from_secs(2);

/// MAC observations split by whether a stored ONU exists for them.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MacPlan {
    pub updates: Vec<MacUpdate>,
    pub unmatched: Vec<OnuKey>,
}

/// Match forwarding-table observations to stored ONUs by `(pon prefix, position)`.
pub fn plan_mac_updates(identities: &[OnuIdentity], observations: &[MacObservation]) -> MacPlan {
    let known: HashSet<&OnuKey> = identities.iter().map(|i| &i.key).collect();
    let mut plan = MacPlan::default();

    for obs in observations {
        let key = OnuKey {
            pon_path: obs.pon_prefix.clone(),
            position: obs.position,
        };
        if known.contains(&key) {
            plan.updates.push(MacUpdate {
                key,
                mac: obs.mac.clone(),
            });
        } else {
            plan.unmatched.push(key);
        }
    }
    plan
}

/// ONUs whose `(serial, description1)` equals some client's `(mac_key, name)`.
///
/// Both sides are compared after trimming; blank keys never match.
pub fn correlate(identities: &[OnuIdentity], clients: &[(String, String)]) -> Vec<OnuKey> {
    let wanted: HashSet<(&str, &str)> = clients
        .iter()
        .map(|(mac, name)| (mac.trim(), name.trim()))
        .filter(|(mac, name)| !mac.is_empty() && !name.is_empty())
        .collect();

    identities
        .iter()
        .filter(|i| wanted.contains(&(i.serial.trim(), i.description1.trim())))
        .map(|i| i.key.clone())
        .collect()
}

/// Last record per `mac_key` wins.
fn dedupe_clients(clients: Vec<FiberClientRecord>) -> Vec<FiberClientRecord> {
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<FiberClientRecord> = Vec::with_capacity(clients.len());
    for client in clients {
        match by_key.get(&client.mac_key) {
            Some(&idx) => out[idx] = client,
            None => {
                by_key.insert(client.mac_key.clone(), out.len());
                out.push(client);
            }
        }
    }
    out
}

/// Writes collected records through a [`SyncStore`].
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn SyncStore>,
}

fn failed(category: Category) -> impl FnOnce(anyhow::Error) -> SyncError {
    move |source| SyncError::Reconcile { category, source }
}

impl Reconciler {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    fn applied(&self, category: Category, start: Instant, input: usize, written: u64) {
        log_if_slow(start, SLOW_WRITE_THRESHOLD, category.as_str());
        info!(
            %category,
            strategy = ?category.strategy(),
            input,
            written,
            "Reconciled records"
        );
    }

    pub async fn port_occupancy(&self, rows: &[PortOccupancy]) -> Result<u64, SyncError> {
        let start = Instant::now();
        let written = self
            .store
            .replace_port_occupancy(rows)
            .await
            .map_err(failed(Category::PortOccupancy))?;
        self.applied(Category::PortOccupancy, start, rows.len(), written);
        Ok(written)
    }

    /// Replace only the ONUs of `port`.
    pub async fn port_onus(&self, port: PonPort, onus: &[Onu]) -> Result<u64, SyncError> {
        let start = Instant::now();
        let pon_path = port.to_string();
        let written = self
            .store
            .replace_port_onus(&pon_path, onus)
            .await
            .map_err(failed(Category::Onus))?;
        debug!(port = %pon_path, written, "Replaced port ONUs");
        log_if_slow(start, SLOW_WRITE_THRESHOLD, "onus");
        Ok(written)
    }

    /// Merge MAC observations into existing ONUs. Observations without a stored ONU are
    /// counted and dropped.
    pub async fn mac_addresses(&self, observations: &[MacObservation]) -> Result<u64, SyncError> {
        let start = Instant::now();
        let identities = self
            .store
            .onu_identities()
            .await
            .map_err(failed(Category::MacAddresses))?;
        let plan = plan_mac_updates(&identities, observations);
        if !plan.unmatched.is_empty() {
            debug!(
                unmatched = plan.unmatched.len(),
                "MAC observations without a stored ONU"
            );
        }

        let written = self
            .store
            .update_onu_macs(&plan.updates)
            .await
            .map_err(failed(Category::MacAddresses))?;
        self.applied(Category::MacAddresses, start, observations.len(), written);
        Ok(written)
    }

    pub async fn system_info(&self, info: &SystemInfo) -> Result<u64, SyncError> {
        let start = Instant::now();
        self.store
            .upsert_system_info(info)
            .await
            .map_err(failed(Category::SystemInfo))?;
        self.applied(Category::SystemInfo, start, 1, 1);
        Ok(1)
    }

    pub async fn slots(&self, slots: &[SlotInventory]) -> Result<u64, SyncError> {
        let start = Instant::now();
        let written = self
            .store
            .replace_slots(slots)
            .await
            .map_err(failed(Category::Slots))?;
        self.applied(Category::Slots, start, slots.len(), written);
        Ok(written)
    }

    pub async fn temperatures(&self, sensors: &[TemperatureSensor]) -> Result<u64, SyncError> {
        let start = Instant::now();
        let written = self
            .store
            .replace_temperatures(sensors)
            .await
            .map_err(failed(Category::Temperatures))?;
        self.applied(Category::Temperatures, start, sensors.len(), written);
        Ok(written)
    }

    pub async fn sfp_diagnostics(&self, rows: &[SfpDiagnostics]) -> Result<u64, SyncError> {
        let start = Instant::now();
        let written = self
            .store
            .replace_sfp_diagnostics(rows)
            .await
            .map_err(failed(Category::Sfp))?;
        self.applied(Category::Sfp, start, rows.len(), written);
        Ok(written)
    }

    pub async fn fiber_clients(&self, clients: Vec<FiberClientRecord>) -> Result<u64, SyncError> {
        let start = Instant::now();
        let input = clients.len();
        let clients = dedupe_clients(clients);
        let written = self
            .store
            .upsert_fiber_clients(&clients)
            .await
            .map_err(failed(Category::FiberClients))?;
        self.applied(Category::FiberClients, start, input, written);
        Ok(written)
    }

    /// Recompute `is_fiber_client` for every stored ONU from the stored client list.
    pub async fn correlate_fiber_clients(&self) -> Result<FlagCounts, SyncError> {
        let start = Instant::now();
        let identities = self
            .store
            .onu_identities()
            .await
            .map_err(failed(Category::FiberClients))?;
        let clients = self
            .store
            .fiber_client_keys()
            .await
            .map_err(failed(Category::FiberClients))?;

        let matched = correlate(&identities, &clients);
        let counts = self
            .store
            .apply_fiber_flags(&matched)
            .await
            .map_err(failed(Category::FiberClients))?;
        log_if_slow(start, SLOW_WRITE_THRESHOLD, "fiber client correlation");
        info!(
            onus = identities.len(),
            clients = clients.len(),
            matched = counts.matched,
            cleared = counts.cleared,
            "Correlated fiber clients"
        );
        Ok(counts)
    }
}
