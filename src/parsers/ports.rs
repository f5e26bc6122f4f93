use super::{ParseError, Parsed, ensure_input, fields};
use crate::data::models::{Category, PonPort, PortOccupancy};

/// Read the ONU count of `port` from the summary line of its status table.
///
/// The first line carrying a `count` marker wins, e.g. `ont count : 42`.
pub fn parse_port_occupancy(raw: &str, port: PonPort) -> Result<Parsed<PortOccupancy>, ParseError> {
    ensure_input(Category::PortOccupancy, raw)?;

    let mut parsed = Parsed::default();
    for (idx, line) in raw.lines().enumerate() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        if !label.to_ascii_lowercase().contains("count") {
            continue;
        }

        match fields::integer::<u32>("count", value) {
            Ok(connected_users) => {
                parsed.records.push(PortOccupancy {
                    slot: port.slot,
                    port: port.port,
                    connected_users,
                });
                break;
            }
            Err(reason) => parsed.skip(Category::PortOccupancy, idx + 1, reason, line),
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str = "\
==================================================================================
ont
==================================================================================
pon-interface ont-interface sernum        admin-status oper-status olt-rx-sig-level
----------------------------------------------------------------------------------
1/1/1/3       1/1/1/3/1     ALCL:B3A1C2D4 up           up          -21.50
----------------------------------------------------------------------------------
ont count : 1
==================================================================================";

    #[test]
    fn test_count_marker() {
        let parsed = parse_port_occupancy(TRANSCRIPT, PonPort::new(1, 1, 1, 3)).unwrap();
        assert_eq!(
            parsed.records,
            vec![PortOccupancy {
                slot: 1,
                port: 3,
                connected_users: 1
            }]
        );
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_compact_marker_for_slot_zero() {
        let parsed = parse_port_occupancy("count:42", PonPort::new(1, 1, 0, 3)).unwrap();
        assert_eq!(
            parsed.records,
            vec![PortOccupancy {
                slot: 0,
                port: 3,
                connected_users: 42
            }]
        );
    }

    #[test]
    fn test_first_marker_wins() {
        let parsed =
            parse_port_occupancy("ont count : 7\nont count : 9", PonPort::new(1, 1, 2, 1)).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].connected_users, 7);
    }

    #[test]
    fn test_no_marker_yields_no_row() {
        let parsed = parse_port_occupancy("invalid pon", PonPort::new(1, 1, 2, 1)).unwrap();
        assert!(parsed.records.is_empty());
    }

    #[test]
    fn test_bad_count_is_skipped() {
        let parsed =
            parse_port_occupancy("ont count : many\nont count : 3", PonPort::new(1, 1, 1, 1))
                .unwrap();
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.records[0].connected_users, 3);
    }
}
