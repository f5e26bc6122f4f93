//! Screen-scraping grammars for the OLT command output.
//!
//! Every parser is a pure function from the cleaned text of one command to a [`Parsed`] set.
//! Rows that cannot be decoded are reported in [`Parsed::skipped`] instead of failing the
//! whole category; only an empty response is a category-level [`ParseError`].

pub mod fdb;
pub mod fields;
pub mod onu;
pub mod ports;
pub mod sfp;
pub mod slots;
pub mod system;
pub mod temperature;

use crate::data::models::Category;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("device returned no {category} output")]
    EmptyInput { category: Category },
    #[error("{category} is not scraped from the device")]
    Unsupported { category: Category },
}

/// Why a row was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// A token outside the accepted vocabulary.
    Vocabulary { field: &'static str, value: String },
    /// A token that did not decode to the expected type.
    InvalidField { field: &'static str, value: String },
    MissingField { field: &'static str },
    /// The identity key was already emitted earlier in the same pass.
    Duplicate { key: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Vocabulary { field, value } => {
                write!(f, "unexpected {field} value {value:?}")
            }
            SkipReason::InvalidField { field, value } => write!(f, "invalid {field} {value:?}"),
            SkipReason::MissingField { field } => write!(f, "missing {field}"),
            SkipReason::Duplicate { key } => write!(f, "duplicate key {key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based line number within the command output.
    pub line: usize,
    pub reason: SkipReason,
    pub text: String,
}

/// Result of parsing one command's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub skipped: Vec<SkippedRow>,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Classification of a single line by a row grammar.
pub(crate) enum Row<T> {
    Record(T),
    Skip(SkipReason),
    /// Headers, separators, banners and blank lines.
    Ignore,
}

pub(crate) fn ensure_input(category: Category, raw: &str) -> Result<(), ParseError> {
    if raw.trim().is_empty() {
        Err(ParseError::EmptyInput { category })
    } else {
        Ok(())
    }
}

/// Run a line grammar over `raw`, dropping rows whose key was already seen.
pub(crate) fn parse_rows<T, K, R, F>(
    category: Category,
    raw: &str,
    mut row: R,
    key: F,
) -> Result<Parsed<T>, ParseError>
where
    K: Eq + Hash + fmt::Display,
    R: FnMut(&str) -> Row<T>,
    F: Fn(&T) -> K,
{
    ensure_input(category, raw)?;

    let mut parsed = Parsed::default();
    let mut seen = HashSet::new();

    for (idx, line) in raw.lines().enumerate() {
        let outcome = match row(line) {
            Row::Ignore => continue,
            Row::Record(record) => {
                let k = key(&record);
                if seen.contains(&k) {
                    Err(SkipReason::Duplicate { key: k.to_string() })
                } else {
                    seen.insert(k);
                    Ok(record)
                }
            }
            Row::Skip(reason) => Err(reason),
        };

        match outcome {
            Ok(record) => parsed.records.push(record),
            Err(reason) => parsed.skip(category, idx + 1, reason, line),
        }
    }

    Ok(parsed)
}

impl<T> Parsed<T> {
    pub(crate) fn skip(&mut self, category: Category, line: usize, reason: SkipReason, text: &str) {
        debug!(%category, line, reason = %reason, "skipping row");
        self.skipped.push(SkippedRow {
            line,
            reason,
            text: text.trim_end().to_string(),
        });
    }
}

/// Output of `oltsync parse`, one variant per category.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnyParsed {
    PortOccupancy(Parsed<crate::data::models::PortOccupancy>),
    Onus(Parsed<crate::data::models::Onu>),
    MacAddresses(Parsed<crate::data::models::MacObservation>),
    SystemInfo(crate::data::models::SystemInfo),
    Slots(Parsed<crate::data::models::SlotInventory>),
    Temperatures(Parsed<crate::data::models::TemperatureSensor>),
    Sfp(Parsed<crate::data::models::SfpDiagnostics>),
}

/// Parse a captured transcript for the given category.
///
/// Port occupancy needs the port the transcript was captured for. A system-info
/// transcript may contain both the version and the uptime output.
pub fn parse_transcript(
    category: Category,
    raw: &str,
    port: crate::data::models::PonPort,
) -> Result<AnyParsed, ParseError> {
    Ok(match category {
        Category::PortOccupancy => AnyParsed::PortOccupancy(ports::parse_port_occupancy(raw, port)?),
        Category::Onus => AnyParsed::Onus(onu::parse_onu_table(raw)?),
        Category::MacAddresses => AnyParsed::MacAddresses(fdb::parse_forwarding_table(raw)?),
        Category::SystemInfo => AnyParsed::SystemInfo(system::parse_system_info(raw, raw)?),
        Category::Slots => AnyParsed::Slots(slots::parse_slots(raw)?),
        Category::Temperatures => AnyParsed::Temperatures(temperature::parse_temperatures(raw)?),
        Category::Sfp => AnyParsed::Sfp(sfp::parse_sfp_diagnostics(raw)?),
        Category::FiberClients => return Err(ParseError::Unsupported { category }),
    })
}
