//! Application configuration, loaded with figment from `oltsync.toml` and the environment.
//!
//! Top-level keys come straight from the environment (`DATABASE_URL`, `PORT`, ...).
//! Device settings use the `NOKIA_` prefix and feed settings the `FEED_` prefix.

use custom_debug_derive::Debug;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[debug(skip)]
    pub database_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
    /// Number of job-queue workers.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Interval between scheduled full synchronizations, aligned to wall-clock boundaries.
    #[serde(
        default = "default_sync_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub sync_interval: Duration,
    #[serde(default = "default_true")]
    pub scheduler_enabled: bool,
    /// Upper bound for a single job, including a full sequence.
    #[serde(
        default = "default_job_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub job_timeout: Duration,
    pub olt: OltConfig,
    #[serde(default)]
    pub feed: Option<FeedConfig>,
}

/// Connection and session parameters for the OLT terminal.
#[derive(Debug, Clone, Deserialize)]
pub struct OltConfig {
    pub host: String,
    #[serde(default = "default_telnet_port")]
    pub port: u16,
    pub username: String,
    #[debug(skip)]
    pub password: String,
    /// Suffix that terminates every command response. Data lines may end in `#`, so keep the
    /// full prompt here.
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Marker that ends the per-port ONT status table, when the device answers that command
    /// with a different prompt than the session's.
    #[serde(default)]
    pub port_prompt: Option<String>,
    #[serde(default)]
    pub verbose: bool,
    /// Multiplier for the 100ms pause inserted before each command.
    #[serde(default = "default_delay_factor")]
    pub global_delay_factor: u32,
    #[serde(
        default = "default_connect_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub connect_timeout: Duration,
    #[serde(
        default = "default_command_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub command_timeout: Duration,
    /// Timeout for commands that dump large tables (forwarding database, full port scans).
    #[serde(
        default = "default_slow_command_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub slow_command_timeout: Duration,
    /// How long a collector waits for the device to become free.
    #[serde(
        default = "default_acquire_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub acquire_timeout: Duration,
    #[serde(default = "default_setup_commands")]
    pub setup_commands: Vec<String>,
    #[serde(default = "default_one")]
    pub rack: u8,
    #[serde(default = "default_one")]
    pub shelf: u8,
    #[serde(default = "default_one")]
    pub first_slot: u8,
    #[serde(default = "default_last_slot")]
    pub last_slot: u8,
    #[serde(default = "default_one")]
    pub first_port: u8,
    #[serde(default = "default_last_port")]
    pub last_port: u8,
}

/// External billing/CRM feed of fiber clients.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    /// Value sent in the `Authorization` header, e.g. `Basic <base64>`.
    #[debug(skip)]
    #[serde(default)]
    pub authorization: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(
        default = "default_feed_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub timeout: Duration,
}

impl Config {
    /// Build the figment used by both early logging setup and the application.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("oltsync.toml"))
            .merge(Env::raw().only(&[
                "log_level",
                "database_url",
                "port",
                "shutdown_timeout",
                "worker_count",
                "sync_interval",
                "scheduler_enabled",
                "job_timeout",
            ]))
            .merge(Env::prefixed("NOKIA_").map(|k| format!("olt.{k}").into()))
            .merge(Env::prefixed("FEED_").map(|k| format!("feed.{k}").into()))
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_worker_count() -> usize {
    2
}

fn default_sync_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_job_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_true() -> bool {
    true
}

fn default_telnet_port() -> u16 {
    23
}

fn default_prompt() -> String {
    "typ:isadmin>#".to_string()
}

fn default_delay_factor() -> u32 {
    2
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_slow_command_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_setup_commands() -> Vec<String> {
    vec!["environment inhibit-alarms mode batch".to_string()]
}

fn default_one() -> u8 {
    1
}

fn default_last_slot() -> u8 {
    2
}

fn default_last_port() -> u8 {
    16
}

fn default_page_size() -> u32 {
    500
}

fn default_feed_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Parse a human-readable duration such as `30s`, `10m` or `1h`.
///
/// A bare number is interpreted as seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let parser = DurationParser::with_time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
        TimeUnit::Day,
    ]);
    let parsed = parser
        .parse(value.trim())
        .map_err(|e| format!("invalid duration {value:?}: {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration {value:?}: {e}"))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn defaults_fill_unset_fields() {
        let config: Config = Figment::new()
            .merge(Serialized::default("database_url", "postgres://localhost/olt"))
            .merge(Serialized::default("olt.host", "192.0.2.10"))
            .merge(Serialized::default("olt.username", "isadmin"))
            .merge(Serialized::default("olt.password", "secret"))
            .merge(Serialized::default("sync_interval", "30m"))
            .extract()
            .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.sync_interval, Duration::from_secs(1800));
        assert_eq!(config.olt.port, 23);
        assert_eq!(config.olt.prompt, "typ:isadmin>#");
        assert_eq!(config.olt.global_delay_factor, 2);
        assert_eq!((config.olt.first_slot, config.olt.last_slot), (1, 2));
        assert_eq!((config.olt.first_port, config.olt.last_port), (1, 16));
        assert!(config.feed.is_none());
    }

    #[test]
    fn debug_output_hides_credentials() {
        let config: Config = Figment::new()
            .merge(Serialized::default("database_url", "postgres://u:pw@db/olt"))
            .merge(Serialized::default("olt.host", "192.0.2.10"))
            .merge(Serialized::default("olt.username", "isadmin"))
            .merge(Serialized::default("olt.password", "ANS#150"))
            .extract()
            .unwrap();

        let out = format!("{config:?}");
        assert!(out.contains("192.0.2.10"));
        assert!(!out.contains("ANS#150"));
        assert!(!out.contains("u:pw"));
    }
}
