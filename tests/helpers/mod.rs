//! Shared fixtures for integration tests: an in-memory store, a scripted device and a
//! static client feed.
#![allow(dead_code)]

use anyhow::{Result, bail};
use async_trait::async_trait;
use oltsync::data::models::{
    FiberClientRecord, MacUpdate, Onu, OnuIdentity, OnuKey, PortOccupancy, SfpDiagnostics,
    SlotInventory, SystemInfo, TemperatureSensor,
};
use oltsync::data::{FlagCounts, SyncStore};
use oltsync::device::{CommandOptions, DeviceError, DeviceGuard, DeviceSession, SessionFactory};
use oltsync::feed::{ClientFeed, FeedError};
use oltsync::reconcile::Reconciler;
use oltsync::sync::SyncContext;
use oltsync::sync::collectors::{CommandTimeouts, PortLayout};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Tables {
    pub occupancy: Vec<PortOccupancy>,
    pub onus: BTreeMap<OnuKey, Onu>,
    pub system: Option<SystemInfo>,
    pub slots: Vec<SlotInventory>,
    pub temperatures: Vec<TemperatureSensor>,
    pub sfp: Vec<SfpDiagnostics>,
    pub clients: BTreeMap<String, FiberClientRecord>,
}

/// [`SyncStore`] over plain collections, with the same replace/upsert semantics as Postgres.
///
/// Writes named with [`MemoryStore::fail_writes`] return an error and leave the tables
/// untouched, like a rolled-back transaction.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryStore {
    /// Make a write fail: `occupancy`, `onus <pon path>`, `macs`, `system`, `slots`,
    /// `temperatures`, `sfp`, `clients` or `flags`.
    pub fn fail_writes(&self, target: &str) {
        self.failing.lock().unwrap().insert(target.to_string());
    }

    fn check(&self, target: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(target) {
            bail!("write to {target} rejected");
        }
        Ok(())
    }

    pub fn snapshot<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.lock().unwrap())
    }

    pub fn seed_onus(&self, onus: impl IntoIterator<Item = Onu>) {
        let mut tables = self.tables.lock().unwrap();
        for onu in onus {
            tables.onus.insert(onu.key(), onu);
        }
    }

    pub fn seed_clients(&self, clients: impl IntoIterator<Item = FiberClientRecord>) {
        let mut tables = self.tables.lock().unwrap();
        for client in clients {
            tables.clients.insert(client.mac_key.clone(), client);
        }
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn replace_port_occupancy(&self, rows: &[PortOccupancy]) -> Result<u64> {
        self.check("occupancy")?;
        self.tables.lock().unwrap().occupancy = rows.to_vec();
        Ok(rows.len() as u64)
    }

    async fn replace_port_onus(&self, pon_path: &str, onus: &[Onu]) -> Result<u64> {
        self.check(&format!("onus {pon_path}"))?;
        let mut tables = self.tables.lock().unwrap();
        tables.onus.retain(|key, _| key.pon_path != pon_path);
        for onu in onus {
            tables.onus.insert(onu.key(), onu.clone());
        }
        Ok(onus.len() as u64)
    }

    async fn onu_identities(&self) -> Result<Vec<OnuIdentity>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .onus
            .values()
            .map(|onu| OnuIdentity {
                key: onu.key(),
                serial: onu.serial.clone(),
                description1: onu.description1.clone(),
            })
            .collect())
    }

    async fn update_onu_macs(&self, updates: &[MacUpdate]) -> Result<u64> {
        self.check("macs")?;
        let mut tables = self.tables.lock().unwrap();
        let mut updated = 0;
        for update in updates {
            if let Some(onu) = tables.onus.get_mut(&update.key) {
                onu.mac = Some(update.mac.clone());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn upsert_system_info(&self, info: &SystemInfo) -> Result<()> {
        self.check("system")?;
        self.tables.lock().unwrap().system = Some(info.clone());
        Ok(())
    }

    async fn replace_slots(&self, slots: &[SlotInventory]) -> Result<u64> {
        self.check("slots")?;
        self.tables.lock().unwrap().slots = slots.to_vec();
        Ok(slots.len() as u64)
    }

    async fn replace_temperatures(&self, sensors: &[TemperatureSensor]) -> Result<u64> {
        self.check("temperatures")?;
        self.tables.lock().unwrap().temperatures = sensors.to_vec();
        Ok(sensors.len() as u64)
    }

    async fn replace_sfp_diagnostics(&self, rows: &[SfpDiagnostics]) -> Result<u64> {
        self.check("sfp")?;
        self.tables.lock().unwrap().sfp = rows.to_vec();
        Ok(rows.len() as u64)
    }

    async fn upsert_fiber_clients(&self, clients: &[FiberClientRecord]) -> Result<u64> {
        self.check("clients")?;
        let mut tables = self.tables.lock().unwrap();
        for client in clients {
            tables.clients.insert(client.mac_key.clone(), client.clone());
        }
        Ok(clients.len() as u64)
    }

    async fn fiber_client_keys(&self) -> Result<Vec<(String, String)>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .clients
            .values()
            .map(|c| (c.mac_key.clone(), c.name.clone()))
            .collect())
    }

    async fn apply_fiber_flags(&self, matched: &[OnuKey]) -> Result<FlagCounts> {
        self.check("flags")?;
        let mut tables = self.tables.lock().unwrap();
        let mut counts = FlagCounts::default();
        for (key, onu) in tables.onus.iter_mut() {
            onu.is_fiber_client = matched.contains(key);
            if onu.is_fiber_client {
                counts.matched += 1;
            } else {
                counts.cleared += 1;
            }
        }
        Ok(counts)
    }
}

/// What the scripted device does for one command.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// The command times out; the session stays usable.
    Timeout,
    /// The device drops the session.
    Drop,
}

/// A fake device that answers commands from a script. Unknown commands return empty output.
#[derive(Clone, Default)]
pub struct ScriptedDevice {
    script: Arc<Mutex<HashMap<String, Reply>>>,
    pub sent: Arc<Mutex<Vec<String>>>,
    pub opened: Arc<Mutex<u32>>,
    pub closed: Arc<Mutex<u32>>,
}

impl ScriptedDevice {
    pub fn reply(self, command: &str, text: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(command.to_string(), Reply::Text(text.to_string()));
        self
    }

    pub fn fail(self, command: &str, reply: Reply) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(command.to_string(), reply);
        self
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sessions(&self) -> (u32, u32) {
        (*self.opened.lock().unwrap(), *self.closed.lock().unwrap())
    }

    pub fn guard(&self) -> DeviceGuard {
        DeviceGuard::new(Arc::new(self.clone()), Duration::from_secs(5))
    }
}

struct ScriptedSession {
    device: ScriptedDevice,
}

#[async_trait]
impl DeviceSession for ScriptedSession {
    async fn send_command(
        &mut self,
        command: &str,
        options: &CommandOptions,
    ) -> Result<String, DeviceError> {
        self.device.sent.lock().unwrap().push(command.to_string());
        let reply = self.device.script.lock().unwrap().get(command).cloned();
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Timeout) => Err(DeviceError::CommandTimeout {
                command: command.to_string(),
                timeout: options.timeout,
            }),
            Some(Reply::Drop) => Err(DeviceError::Closed),
            None => Ok(String::new()),
        }
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        *self.device.closed.lock().unwrap() += 1;
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for ScriptedDevice {
    async fn open(&self) -> Result<Box<dyn DeviceSession>, DeviceError> {
        *self.opened.lock().unwrap() += 1;
        Ok(Box::new(ScriptedSession {
            device: self.clone(),
        }))
    }
}

/// A feed that always returns the same records.
pub struct StaticFeed(pub Vec<FiberClientRecord>);

#[async_trait]
impl ClientFeed for StaticFeed {
    async fn fetch_all(&self) -> Result<Vec<FiberClientRecord>, FeedError> {
        Ok(self.0.clone())
    }
}

/// A feed whose server answers every page with `503`.
pub struct FailingFeed;

#[async_trait]
impl ClientFeed for FailingFeed {
    async fn fetch_all(&self) -> Result<Vec<FiberClientRecord>, FeedError> {
        Err(FeedError::Status {
            status: 503,
            page: 1,
        })
    }
}

pub const VERSION: &str = "\
vendor-id : ALCL              isam-release : R6.2.04m
equip-id : 1234               ont-sw-release : 3FE-12345";

pub const UPTIME: &str = "System Up Time         : 12 days, 3:04:05.00 (hr:min:sec)";

pub const SLOTS: &str = "\
slot          actual-type  enabled  error-status  availability   restrt-cnt
-------------------------------------------------------------------------------
nt-a          fant-f       yes      no-error      available      1
lt:1/1/1      fwlt-b       yes      no-error      available      2";

pub const TEMPERATURES: &str = "\
slot      sensor-id  actual-temp  tca-low  tca-high  shut-low  shut-high
-------------------------------------------------------------------------------
nt-a      1          46           -5       75        -8        85";

pub const SFP: &str = "\
sfp-faceplate-number : nt-a:xfp:1             vendor-name : ALCATEL
temperature : 38.5 degrees Celsius            voltage : 3.29 VDC
tx-power : -2.10 dBm                          rx-power : N/A";

pub const FDB: &str = "\
port                    vlan-id   mac                 type        status
1/1/1/1/1/14/1          100       00:1A:2B:3C:4D:5E   learned     forwarding";

/// Answers every collector command with a small, well-formed transcript.
pub fn healthy_device() -> ScriptedDevice {
    ScriptedDevice::default()
        .reply("show software-mngt version etsi", VERSION)
        .reply("show core1-uptime", UPTIME)
        .reply("show equipment slot", SLOTS)
        .reply("show equipment temperature", TEMPERATURES)
        .reply("show equipment diagnostics sfp detail", SFP)
        .reply(
            &ont_command("1/1/1/1"),
            &ont_table("1/1/1/1", &[(1, "ALCL:B3A1C2D4", "MARIA SOUZA")]),
        )
        .reply(&ont_command("1/1/1/2"), &ont_table("1/1/1/2", &[]))
        .reply("show vlan bridge-port-fdb", FDB)
}

/// Slot 1, ports 1 and 2.
pub fn two_port_layout() -> PortLayout {
    PortLayout {
        rack: 1,
        shelf: 1,
        first_slot: 1,
        last_slot: 1,
        first_port: 1,
        last_port: 2,
    }
}

pub fn make_context(
    store: Arc<MemoryStore>,
    device: &ScriptedDevice,
    feed: Option<Arc<dyn ClientFeed>>,
) -> SyncContext {
    SyncContext {
        device: device.guard(),
        reconciler: Reconciler::new(store),
        feed,
        layout: two_port_layout(),
        timeouts: CommandTimeouts {
            command: Duration::from_secs(1),
            slow: Duration::from_secs(2),
            port_prompt: None,
        },
    }
}

pub fn ont_command(port: &str) -> String {
    format!("show equipment ont status pon {port}")
}

/// ONT status output for `port` with one row per `(position, serial, description1)`.
pub fn ont_table(port: &str, rows: &[(u8, &str, &str)]) -> String {
    let mut out = String::from(
        "pon-interface ont-interface sernum         admin-status oper-status olt-rx-sig-level ont-olt-distance desc1          desc2          hostname\n",
    );
    out.push_str(&"-".repeat(127));
    out.push('\n');
    for (position, serial, desc1) in rows {
        out.push_str(&format!(
            "{:<14}{:<14}{:<15}up           up          -21.50           2.3              {:<15}undefined      undefined\n",
            port,
            format!("{port}/{position}"),
            serial,
            desc1
        ));
    }
    out.push_str(&"-".repeat(127));
    out.push_str(&format!("\nont count : {}\n", rows.len()));
    out
}

pub fn make_onu(pon_path: &str, position: u8, serial: &str, description1: &str) -> Onu {
    Onu {
        pon_path: pon_path.to_string(),
        position,
        mac: None,
        serial: serial.to_string(),
        admin_state: oltsync::data::models::LinkState::Up,
        oper_state: oltsync::data::models::LinkState::Up,
        rx_signal_dbm: Some(-21.5),
        distance_m: Some(2300),
        description1: description1.to_string(),
        description2: String::new(),
        is_fiber_client: false,
    }
}

pub fn make_client(mac_key: &str, name: &str) -> FiberClientRecord {
    FiberClientRecord {
        mac_key: mac_key.to_string(),
        name: name.to_string(),
        latitude: None,
        longitude: None,
        address: None,
        container_id: None,
    }
}
