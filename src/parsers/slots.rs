use super::fields::integer;
use super::{ParseError, Parsed, Row, SkipReason, parse_rows};
use crate::data::models::{Category, SlotInventory};

/// Name prefixes of the hardware units listed in slot and temperature tables.
pub const UNIT_PREFIXES: [&str; 7] = ["acu:", "nt-", "nt:", "ntio-", "lt:", "ctrl:", "fan"];

pub fn is_unit_name(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    UNIT_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

/// Parse `show equipment slot`.
pub fn parse_slots(raw: &str) -> Result<Parsed<SlotInventory>, ParseError> {
    parse_rows(
        Category::Slots,
        raw,
        |line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.first() {
                Some(name) if is_unit_name(name) => match parse_row(&tokens) {
                    Ok(slot) => Row::Record(slot),
                    Err(reason) => Row::Skip(reason),
                },
                _ => Row::Ignore,
            }
        },
        |slot: &SlotInventory| slot.slot_name.clone(),
    )
}

fn parse_row(tokens: &[&str]) -> Result<SlotInventory, SkipReason> {
    const COLUMNS: [&str; 6] = [
        "slot",
        "actual-type",
        "enabled",
        "error-status",
        "availability",
        "restart-count",
    ];
    if tokens.len() < COLUMNS.len() {
        return Err(SkipReason::MissingField {
            field: COLUMNS[tokens.len()],
        });
    }

    let enabled = match tokens[2].to_ascii_lowercase().as_str() {
        "yes" | "true" | "enabled" => true,
        "no" | "false" | "disabled" => false,
        other => {
            return Err(SkipReason::Vocabulary {
                field: "enabled",
                value: other.to_string(),
            });
        }
    };

    Ok(SlotInventory {
        slot_name: tokens[0].to_string(),
        card_type: tokens[1].to_string(),
        enabled,
        error_status: tokens[3].to_string(),
        availability: tokens[4].to_string(),
        restart_count: integer("restart-count", tokens[5])?,
    })
}
