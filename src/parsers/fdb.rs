use super::fields::is_path;
use super::{ParseError, Parsed, Row, SkipReason, parse_rows};
use crate::data::models::{Category, MacObservation, OnuKey};
use regex::Regex;
use std::sync::LazyLock;

static MAC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b([0-9a-f]{2}(?:[:-][0-9a-f]{2}){5}|[0-9a-f]{4}\.[0-9a-f]{4}\.[0-9a-f]{4})\b",
    )
    .unwrap()
});

/// Parse `show vlan bridge-port-fdb` output.
///
/// Interfaces look like `<pon prefix>/<position>/<card>/<port>`; the first MAC seen for a
/// given prefix and position wins.
pub fn parse_forwarding_table(raw: &str) -> Result<Parsed<MacObservation>, ParseError> {
    parse_rows(
        Category::MacAddresses,
        raw,
        |line| match parse_row(line) {
            Ok(Some(observation)) => Row::Record(observation),
            Ok(None) => Row::Ignore,
            Err(reason) => Row::Skip(reason),
        },
        |obs: &MacObservation| OnuKey {
            pon_path: obs.pon_prefix.clone(),
            position: obs.position,
        },
    )
}

fn parse_row(line: &str) -> Result<Option<MacObservation>, SkipReason> {
    let Some(interface) = line.split_whitespace().next().filter(|t| is_path(t)) else {
        return Ok(None);
    };

    let segments: Vec<&str> = interface.split('/').collect();
    if segments.len() < 4 {
        return Err(SkipReason::InvalidField {
            field: "interface",
            value: interface.to_string(),
        });
    }
    let split = segments.len() - 3;
    let position = segments[split]
        .parse::<u8>()
        .ok()
        .filter(|p| *p >= 1)
        .ok_or_else(|| SkipReason::InvalidField {
            field: "position",
            value: segments[split].to_string(),
        })?;

    let mac = MAC_RE
        .find(line)
        .map(|m| normalize_mac(m.as_str()))
        .ok_or(SkipReason::MissingField { field: "mac" })?;

    Ok(Some(MacObservation {
        pon_prefix: segments[..split].join("/"),
        position,
        mac,
    }))
}

/// Lowercase, colon-separated form of any common MAC notation.
pub fn normalize_mac(mac: &str) -> String {
    let hex: String = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    hex.as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
==========================================================================================
port fdb table
==========================================================================================
port                    vlan-id   mac                 type        status
------------------------------------------------------------------------------------------
1/1/1/1/5/14/1          100       00:1A:2B:3C:4D:5E   learned     forwarding
1/1/1/1/6/14/1          100       0a1b.2c3d.4e5f      learned     forwarding
1/1/1/1/5/14/1          200       00:1a:2b:3c:4d:99   learned     forwarding
1/1/1/1/7/14/1          100       --                  learned     forwarding
------------------------------------------------------------------------------------------
fdb count : 4";

    #[test]
    fn test_forwarding_rows() {
        let parsed = parse_forwarding_table(TABLE).unwrap();
        assert_eq!(
            parsed.records,
            vec![
                MacObservation {
                    pon_prefix: "1/1/1/1".into(),
                    position: 5,
                    mac: "00:1a:2b:3c:4d:5e".into(),
                },
                MacObservation {
                    pon_prefix: "1/1/1/1".into(),
                    position: 6,
                    mac: "0a:1b:2c:3d:4e:5f".into(),
                },
            ]
        );
    }

    #[test]
    fn test_first_observation_wins_and_missing_mac_skips() {
        let parsed = parse_forwarding_table(TABLE).unwrap();
        assert_eq!(parsed.skipped.len(), 2);
        assert!(matches!(
            parsed.skipped[0].reason,
            SkipReason::Duplicate { .. }
        ));
        assert_eq!(
            parsed.skipped[1].reason,
            SkipReason::MissingField { field: "mac" }
        );
    }

    #[test]
    fn test_short_prefix() {
        let parsed = parse_forwarding_table("1/1/0/5/14/1  100  AA-BB-CC-DD-EE-FF  learned").unwrap();
        assert_eq!(parsed.records[0].pon_prefix, "1/1/0");
        assert_eq!(parsed.records[0].position, 5);
        assert_eq!(parsed.records[0].mac, "aa:bb:cc:dd:ee:ff");
    }
}
