use super::fields::{is_path, leading_tokens, number, wide_columns};
use super::{ParseError, Parsed, Row, SkipReason, parse_rows};
use crate::data::models::{Category, LinkState, Onu};
use regex::Regex;
use std::sync::LazyLock;

static SERIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{2,8}:[0-9A-Fa-f]{4,16}$").unwrap());

/// Fixed columns before the free-text descriptions.
const FIXED_COLUMNS: [&str; 7] = [
    "pon",
    "ont",
    "serial",
    "admin-state",
    "oper-state",
    "rx-signal",
    "distance",
];

pub const MAX_POSITION: u8 = 128;

/// Character offsets of the description columns, taken from the table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DescColumns {
    desc1: usize,
    desc2: usize,
    end: Option<usize>,
}

impl DescColumns {
    fn from_header(line: &str) -> Option<Self> {
        let lower = line.to_ascii_lowercase();
        let desc1 = char_offset(&lower, lower.find("desc1")?);
        let desc2_byte = lower.find("desc2")?;
        let desc2 = char_offset(&lower, desc2_byte);

        // The column after desc2, if the header has one.
        let after = &lower[desc2_byte + "desc2".len()..];
        let end = after
            .find(|c: char| !c.is_whitespace())
            .map(|rel| char_offset(&lower, desc2_byte + "desc2".len() + rel));

        (desc1 < desc2).then_some(Self { desc1, desc2, end })
    }

    fn slice(&self, line: &str) -> (String, String) {
        let chars: Vec<char> = line.chars().collect();
        let take = |from: usize, to: usize| -> String {
            let to = to.min(chars.len());
            if from >= to {
                return String::new();
            }
            chars[from..to].iter().collect::<String>().trim().to_string()
        };
        (
            take(self.desc1, self.desc2),
            take(self.desc2, self.end.unwrap_or(chars.len())),
        )
    }
}

fn char_offset(s: &str, byte_idx: usize) -> usize {
    s[..byte_idx].chars().count()
}

/// Parse the `show equipment ont status pon` table.
///
/// Rows are emitted only when both state columns are `up` or `down`; the signal column
/// accepts the literal `invalid`, which becomes an absent reading.
pub fn parse_onu_table(raw: &str) -> Result<Parsed<Onu>, ParseError> {
    let mut columns: Option<DescColumns> = None;

    parse_rows(
        Category::Onus,
        raw,
        |line| {
            if columns.is_none()
                && let Some(found) = DescColumns::from_header(line)
            {
                columns = Some(found);
                return Row::Ignore;
            }
            match parse_row(line, columns.as_ref()) {
                Ok(Some(onu)) => Row::Record(onu),
                Ok(None) => Row::Ignore,
                Err(reason) => Row::Skip(reason),
            }
        },
        Onu::key,
    )
}

fn parse_row(line: &str, columns: Option<&DescColumns>) -> Result<Option<Onu>, SkipReason> {
    let (tokens, rest) = leading_tokens(line, FIXED_COLUMNS.len());
    match tokens.first() {
        Some(first) if is_path(first) => {}
        _ => return Ok(None),
    }
    if tokens.len() < FIXED_COLUMNS.len() {
        return Err(SkipReason::MissingField {
            field: FIXED_COLUMNS[tokens.len()],
        });
    }

    let pon_path = tokens[0].to_string();
    let position = parse_position(tokens[1])?;

    let serial = tokens[2];
    if !SERIAL_RE.is_match(serial) {
        return Err(SkipReason::InvalidField {
            field: "serial",
            value: serial.to_string(),
        });
    }

    let admin_state = link_state("admin-state", tokens[3])?;
    let oper_state = link_state("oper-state", tokens[4])?;

    let rx_signal_dbm = if tokens[5].eq_ignore_ascii_case("invalid") {
        None
    } else {
        Some(number("rx-signal", tokens[5])?)
    };

    let distance_m = tokens[6]
        .parse::<f64>()
        .ok()
        .filter(|km| km.is_finite() && *km >= 0.0)
        .map(|km| (km * 1000.0).round() as u32);

    let (description1, description2) = match columns {
        Some(cols) => cols.slice(line),
        None => {
            let mut descs = wide_columns(rest).into_iter();
            (
                descs.next().unwrap_or_default().to_string(),
                descs.next().unwrap_or_default().to_string(),
            )
        }
    };

    Ok(Some(Onu {
        pon_path,
        position,
        mac: None,
        serial: serial.to_string(),
        admin_state,
        oper_state,
        rx_signal_dbm,
        distance_m,
        description1,
        description2,
        is_fiber_client: false,
    }))
}

fn parse_position(ont_path: &str) -> Result<u8, SkipReason> {
    let invalid = || SkipReason::InvalidField {
        field: "ont",
        value: ont_path.to_string(),
    };
    if !is_path(ont_path) {
        return Err(invalid());
    }
    ont_path
        .rsplit('/')
        .next()
        .and_then(|seg| seg.parse::<u8>().ok())
        .filter(|pos| (1..=MAX_POSITION).contains(pos))
        .ok_or_else(invalid)
}

fn link_state(field: &'static str, token: &str) -> Result<LinkState, SkipReason> {
    token
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| SkipReason::Vocabulary {
            field,
            value: token.to_string(),
        })
}
