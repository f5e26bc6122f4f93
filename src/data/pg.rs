//! PostgreSQL implementation of [`SyncStore`].

use crate::data::models::{
    FiberClientRecord, MacUpdate, Onu, OnuIdentity, OnuKey, PortOccupancy, SfpDiagnostics,
    SlotInventory, SystemInfo, TemperatureSensor,
};
use crate::data::store::{FlagCounts, SyncStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[async_trait]
impl SyncStore for PgStore {
    async fn replace_port_occupancy(&self, rows: &[PortOccupancy]) -> Result<u64> {
        let slots: Vec<i16> = rows.iter().map(|r| i16::from(r.slot)).collect();
        let ports: Vec<i16> = rows.iter().map(|r| i16::from(r.port)).collect();
        let counts: Vec<i32> = rows.iter().map(|r| to_i32(r.connected_users)).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        sqlx::query("DELETE FROM port_occupancy")
            .execute(&mut *tx)
            .await
            .context("failed to clear port occupancy")?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO port_occupancy (slot, port, connected_users, last_updated)
            SELECT v.slot, v.port, v.connected_users, NOW()
            FROM UNNEST($1::int2[], $2::int2[], $3::int4[]) AS v(slot, port, connected_users)
            "#,
        )
        .bind(&slots)
        .bind(&ports)
        .bind(&counts)
        .execute(&mut *tx)
        .await
        .context("failed to insert port occupancy")?
        .rows_affected();
        tx.commit().await.context("failed to commit port occupancy")?;

        Ok(inserted)
    }

    async fn replace_port_onus(&self, pon_path: &str, onus: &[Onu]) -> Result<u64> {
        let positions: Vec<i16> = onus.iter().map(|o| i16::from(o.position)).collect();
        let macs: Vec<Option<&str>> = onus.iter().map(|o| o.mac.as_deref()).collect();
        let serials: Vec<&str> = onus.iter().map(|o| o.serial.as_str()).collect();
        let admin: Vec<&str> = onus.iter().map(|o| o.admin_state.as_str()).collect();
        let oper: Vec<&str> = onus.iter().map(|o| o.oper_state.as_str()).collect();
        let signals: Vec<Option<f64>> = onus.iter().map(|o| o.rx_signal_dbm).collect();
        let distances: Vec<Option<i32>> = onus.iter().map(|o| o.distance_m.map(to_i32)).collect();
        let desc1: Vec<&str> = onus.iter().map(|o| o.description1.as_str()).collect();
        let desc2: Vec<&str> = onus.iter().map(|o| o.description2.as_str()).collect();
        let fiber: Vec<bool> = onus.iter().map(|o| o.is_fiber_client).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        sqlx::query("DELETE FROM onus WHERE pon_path = $1")
            .bind(pon_path)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to clear ONUs of {pon_path}"))?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO onus (
                pon_path, position, mac, serial, admin_state, oper_state,
                rx_signal_dbm, distance_m, description1, description2, is_fiber_client,
                last_updated
            )
            SELECT
                $1, v.position, v.mac, v.serial, v.admin_state, v.oper_state,
                v.rx_signal_dbm, v.distance_m, v.description1, v.description2, v.is_fiber_client,
                NOW()
            FROM UNNEST(
                $2::int2[], $3::text[], $4::text[], $5::text[], $6::text[],
                $7::float8[], $8::int4[], $9::text[], $10::text[], $11::bool[]
            ) AS v(
                position, mac, serial, admin_state, oper_state,
                rx_signal_dbm, distance_m, description1, description2, is_fiber_client
            )
            "#,
        )
        .bind(pon_path)
        .bind(&positions)
        .bind(&macs)
        .bind(&serials)
        .bind(&admin)
        .bind(&oper)
        .bind(&signals)
        .bind(&distances)
        .bind(&desc1)
        .bind(&desc2)
        .bind(&fiber)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to insert ONUs of {pon_path}"))?
        .rows_affected();
        tx.commit()
            .await
            .with_context(|| format!("failed to commit ONUs of {pon_path}"))?;

        Ok(inserted)
    }

    async fn onu_identities(&self) -> Result<Vec<OnuIdentity>> {
        let rows: Vec<(String, i16, String, String)> = sqlx::query_as(
            "SELECT pon_path, position, serial, description1 FROM onus ORDER BY pon_path, position",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load ONU identities")?;

        Ok(rows
            .into_iter()
            .filter_map(|(pon_path, position, serial, description1)| {
                Some(OnuIdentity {
                    key: OnuKey {
                        pon_path,
                        position: u8::try_from(position).ok()?,
                    },
                    serial,
                    description1,
                })
            })
            .collect())
    }

    async fn update_onu_macs(&self, updates: &[MacUpdate]) -> Result<u64> {
        if updates.is_empty() {
            return Ok(0);
        }
        let paths: Vec<&str> = updates.iter().map(|u| u.key.pon_path.as_str()).collect();
        let positions: Vec<i16> = updates.iter().map(|u| i16::from(u.key.position)).collect();
        let macs: Vec<&str> = updates.iter().map(|u| u.mac.as_str()).collect();

        let updated = sqlx::query(
            r#"
            UPDATE onus AS o
            SET mac = v.mac, last_updated = NOW()
            FROM UNNEST($1::text[], $2::int2[], $3::text[]) AS v(pon_path, position, mac)
            WHERE o.pon_path = v.pon_path AND o.position = v.position
            "#,
        )
        .bind(&paths)
        .bind(&positions)
        .bind(&macs)
        .execute(&self.pool)
        .await
        .context("failed to update ONU MAC addresses")?
        .rows_affected();

        Ok(updated)
    }

    async fn upsert_system_info(&self, info: &SystemInfo) -> Result<()> {
        let uptime = &info.uptime;
        sqlx::query(
            r#"
            INSERT INTO system_info (
                id, software_release, uptime_days, uptime_hours, uptime_minutes,
                uptime_seconds, uptime_raw, uptime_parsed, last_updated
            )
            VALUES (1, $1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (id) DO UPDATE SET
                software_release = EXCLUDED.software_release,
                uptime_days = EXCLUDED.uptime_days,
                uptime_hours = EXCLUDED.uptime_hours,
                uptime_minutes = EXCLUDED.uptime_minutes,
                uptime_seconds = EXCLUDED.uptime_seconds,
                uptime_raw = EXCLUDED.uptime_raw,
                uptime_parsed = EXCLUDED.uptime_parsed,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(info.software_release.as_deref())
        .bind(to_i32(uptime.days))
        .bind(to_i32(uptime.hours))
        .bind(to_i32(uptime.minutes))
        .bind(to_i32(uptime.seconds))
        .bind(&uptime.raw)
        .bind(uptime.parsed)
        .execute(&self.pool)
        .await
        .context("failed to upsert system info")?;

        Ok(())
    }

    async fn replace_slots(&self, slots: &[SlotInventory]) -> Result<u64> {
        let names: Vec<&str> = slots.iter().map(|s| s.slot_name.as_str()).collect();
        let types: Vec<&str> = slots.iter().map(|s| s.card_type.as_str()).collect();
        let enabled: Vec<bool> = slots.iter().map(|s| s.enabled).collect();
        let errors: Vec<&str> = slots.iter().map(|s| s.error_status.as_str()).collect();
        let availability: Vec<&str> = slots.iter().map(|s| s.availability.as_str()).collect();
        let restarts: Vec<i32> = slots.iter().map(|s| to_i32(s.restart_count)).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        sqlx::query("DELETE FROM slots")
            .execute(&mut *tx)
            .await
            .context("failed to clear slots")?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO slots (
                slot_name, card_type, enabled, error_status, availability, restart_count,
                last_updated
            )
            SELECT v.slot_name, v.card_type, v.enabled, v.error_status, v.availability,
                   v.restart_count, NOW()
            FROM UNNEST($1::text[], $2::text[], $3::bool[], $4::text[], $5::text[], $6::int4[])
                AS v(slot_name, card_type, enabled, error_status, availability, restart_count)
            "#,
        )
        .bind(&names)
        .bind(&types)
        .bind(&enabled)
        .bind(&errors)
        .bind(&availability)
        .bind(&restarts)
        .execute(&mut *tx)
        .await
        .context("failed to insert slots")?
        .rows_affected();
        tx.commit().await.context("failed to commit slots")?;

        Ok(inserted)
    }

    async fn replace_temperatures(&self, sensors: &[TemperatureSensor]) -> Result<u64> {
        let names: Vec<&str> = sensors.iter().map(|s| s.slot_name.as_str()).collect();
        let ids: Vec<i32> = sensors.iter().map(|s| to_i32(s.sensor_id)).collect();
        let actual: Vec<f64> = sensors.iter().map(|s| s.actual_c).collect();
        let warn_low: Vec<f64> = sensors.iter().map(|s| s.warn_low).collect();
        let warn_high: Vec<f64> = sensors.iter().map(|s| s.warn_high).collect();
        let shut_low: Vec<f64> = sensors.iter().map(|s| s.shutdown_low).collect();
        let shut_high: Vec<f64> = sensors.iter().map(|s| s.shutdown_high).collect();
        let statuses: Vec<&str> = sensors.iter().map(|s| s.status().as_str()).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        sqlx::query("DELETE FROM temperature_sensors")
            .execute(&mut *tx)
            .await
            .context("failed to clear temperature sensors")?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO temperature_sensors (
                slot_name, sensor_id, actual_c, warn_low, warn_high, shutdown_low,
                shutdown_high, status, last_updated
            )
            SELECT v.slot_name, v.sensor_id, v.actual_c, v.warn_low, v.warn_high,
                   v.shutdown_low, v.shutdown_high, v.status, NOW()
            FROM UNNEST(
                $1::text[], $2::int4[], $3::float8[], $4::float8[], $5::float8[],
                $6::float8[], $7::float8[], $8::text[]
            ) AS v(
                slot_name, sensor_id, actual_c, warn_low, warn_high,
                shutdown_low, shutdown_high, status
            )
            "#,
        )
        .bind(&names)
        .bind(&ids)
        .bind(&actual)
        .bind(&warn_low)
        .bind(&warn_high)
        .bind(&shut_low)
        .bind(&shut_high)
        .bind(&statuses)
        .execute(&mut *tx)
        .await
        .context("failed to insert temperature sensors")?
        .rows_affected();
        tx.commit()
            .await
            .context("failed to commit temperature sensors")?;

        Ok(inserted)
    }

    async fn replace_sfp_diagnostics(&self, rows: &[SfpDiagnostics]) -> Result<u64> {
        let interfaces: Vec<&str> = rows.iter().map(|r| r.interface.as_str()).collect();
        let vendors: Vec<Option<&str>> = rows.iter().map(|r| r.vendor_name.as_deref()).collect();
        let parts: Vec<Option<&str>> = rows.iter().map(|r| r.part_number.as_deref()).collect();
        let serials: Vec<Option<&str>> = rows.iter().map(|r| r.serial_number.as_deref()).collect();
        let temps: Vec<Option<f64>> = rows.iter().map(|r| r.temperature_c).collect();
        let volts: Vec<Option<f64>> = rows.iter().map(|r| r.voltage_v).collect();
        let tx_power: Vec<Option<f64>> = rows.iter().map(|r| r.tx_power_dbm).collect();
        let rx_power: Vec<Option<f64>> = rows.iter().map(|r| r.rx_power_dbm).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        sqlx::query("DELETE FROM sfp_diagnostics")
            .execute(&mut *tx)
            .await
            .context("failed to clear SFP diagnostics")?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO sfp_diagnostics (
                interface, vendor_name, part_number, serial_number, temperature_c,
                voltage_v, tx_power_dbm, rx_power_dbm, last_updated
            )
            SELECT v.interface, v.vendor_name, v.part_number, v.serial_number,
                   v.temperature_c, v.voltage_v, v.tx_power_dbm, v.rx_power_dbm, NOW()
            FROM UNNEST(
                $1::text[], $2::text[], $3::text[], $4::text[],
                $5::float8[], $6::float8[], $7::float8[], $8::float8[]
            ) AS v(
                interface, vendor_name, part_number, serial_number,
                temperature_c, voltage_v, tx_power_dbm, rx_power_dbm
            )
            "#,
        )
        .bind(&interfaces)
        .bind(&vendors)
        .bind(&parts)
        .bind(&serials)
        .bind(&temps)
        .bind(&volts)
        .bind(&tx_power)
        .bind(&rx_power)
        .execute(&mut *tx)
        .await
        .context("failed to insert SFP diagnostics")?
        .rows_affected();
        tx.commit()
            .await
            .context("failed to commit SFP diagnostics")?;

        Ok(inserted)
    }

    async fn upsert_fiber_clients(&self, clients: &[FiberClientRecord]) -> Result<u64> {
        if clients.is_empty() {
            return Ok(0);
        }
        let keys: Vec<&str> = clients.iter().map(|c| c.mac_key.as_str()).collect();
        let names: Vec<&str> = clients.iter().map(|c| c.name.as_str()).collect();
        let lats: Vec<Option<f64>> = clients.iter().map(|c| c.latitude).collect();
        let lons: Vec<Option<f64>> = clients.iter().map(|c| c.longitude).collect();
        let addresses: Vec<Option<&str>> = clients.iter().map(|c| c.address.as_deref()).collect();
        let containers: Vec<Option<&str>> =
            clients.iter().map(|c| c.container_id.as_deref()).collect();

        let affected = sqlx::query(
            r#"
            INSERT INTO fiber_clients (
                mac_key, name, latitude, longitude, address, container_id, last_synced_at
            )
            SELECT v.mac_key, v.name, v.latitude, v.longitude, v.address, v.container_id, NOW()
            FROM UNNEST(
                $1::text[], $2::text[], $3::float8[], $4::float8[], $5::text[], $6::text[]
            ) AS v(mac_key, name, latitude, longitude, address, container_id)
            ON CONFLICT (mac_key) DO UPDATE SET
                name = EXCLUDED.name,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                address = EXCLUDED.address,
                container_id = EXCLUDED.container_id,
                last_synced_at = EXCLUDED.last_synced_at
            "#,
        )
        .bind(&keys)
        .bind(&names)
        .bind(&lats)
        .bind(&lons)
        .bind(&addresses)
        .bind(&containers)
        .execute(&self.pool)
        .await
        .context("failed to upsert fiber clients")?
        .rows_affected();

        Ok(affected)
    }

    async fn fiber_client_keys(&self) -> Result<Vec<(String, String)>> {
        sqlx::query_as("SELECT mac_key, name FROM fiber_clients")
            .fetch_all(&self.pool)
            .await
            .context("failed to load fiber client keys")
    }

    async fn apply_fiber_flags(&self, matched: &[OnuKey]) -> Result<FlagCounts> {
        let paths: Vec<&str> = matched.iter().map(|k| k.pon_path.as_str()).collect();
        let positions: Vec<i16> = matched.iter().map(|k| i16::from(k.position)).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        let set = sqlx::query(
            r#"
            UPDATE onus AS o
            SET is_fiber_client = TRUE
            FROM UNNEST($1::text[], $2::int2[]) AS v(pon_path, position)
            WHERE o.pon_path = v.pon_path AND o.position = v.position
            "#,
        )
        .bind(&paths)
        .bind(&positions)
        .execute(&mut *tx)
        .await
        .context("failed to flag fiber clients")?
        .rows_affected();
        let cleared = sqlx::query(
            r#"
            UPDATE onus AS o
            SET is_fiber_client = FALSE
            WHERE NOT EXISTS (
                SELECT 1 FROM UNNEST($1::text[], $2::int2[]) AS v(pon_path, position)
                WHERE o.pon_path = v.pon_path AND o.position = v.position
            )
            "#,
        )
        .bind(&paths)
        .bind(&positions)
        .execute(&mut *tx)
        .await
        .context("failed to clear fiber client flags")?
        .rows_affected();
        tx.commit()
            .await
            .context("failed to commit fiber client flags")?;

        Ok(FlagCounts {
            matched: set,
            cleared,
        })
    }
}
