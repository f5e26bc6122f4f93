use super::fields::{integer, number};
use super::slots::is_unit_name;
use super::{ParseError, Parsed, Row, SkipReason, parse_rows};
use crate::data::models::{Category, TemperatureSensor};

/// Parse `show equipment temperature`.
///
/// Columns: unit, sensor id, actual, warning low/high, shutdown low/high.
pub fn parse_temperatures(raw: &str) -> Result<Parsed<TemperatureSensor>, ParseError> {
    parse_rows(
        Category::Temperatures,
        raw,
        |line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.first() {
                Some(name) if is_unit_name(name) => match parse_row(&tokens) {
                    Ok(sensor) => Row::Record(sensor),
                    Err(reason) => Row::Skip(reason),
                },
                _ => Row::Ignore,
            }
        },
        |sensor: &TemperatureSensor| SensorKey(sensor.slot_name.clone(), sensor.sensor_id),
    )
}

#[derive(PartialEq, Eq, Hash)]
struct SensorKey(String, u32);

impl std::fmt::Display for SensorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.0, self.1)
    }
}

fn parse_row(tokens: &[&str]) -> Result<TemperatureSensor, SkipReason> {
    const COLUMNS: [&str; 7] = [
        "slot",
        "sensor-id",
        "actual-temp",
        "tca-low",
        "tca-high",
        "shutdown-low",
        "shutdown-high",
    ];
    if tokens.len() < COLUMNS.len() {
        return Err(SkipReason::MissingField {
            field: COLUMNS[tokens.len()],
        });
    }

    Ok(TemperatureSensor {
        slot_name: tokens[0].to_string(),
        sensor_id: integer(COLUMNS[1], tokens[1])?,
        actual_c: number(COLUMNS[2], tokens[2])?,
        warn_low: number(COLUMNS[3], tokens[3])?,
        warn_high: number(COLUMNS[4], tokens[4])?,
        shutdown_low: number(COLUMNS[5], tokens[5])?,
        shutdown_high: number(COLUMNS[6], tokens[6])?,
    })
}
