use super::fields::{first_decimal, is_absent, label_values};
use super::{ParseError, Parsed, SkipReason, ensure_input};
use crate::data::models::{Category, SfpDiagnostics};
use std::collections::HashSet;

const INTERFACE_LABELS: [&str; 3] = ["sfp-faceplate-number", "interface", "sfp-port"];

/// Parse `show equipment diagnostics sfp detail`.
///
/// Each record starts at an interface label and collects the `label : value` pairs that
/// follow until the next interface label.
pub fn parse_sfp_diagnostics(raw: &str) -> Result<Parsed<SfpDiagnostics>, ParseError> {
    ensure_input(Category::Sfp, raw)?;

    let mut parsed = Parsed::default();
    let mut seen = HashSet::new();
    let mut current: Option<SfpDiagnostics> = None;

    for (idx, line) in raw.lines().enumerate() {
        for (label, value) in label_values(line) {
            if INTERFACE_LABELS.contains(&label.as_str()) {
                if let Some(done) = current.take() {
                    parsed.records.push(done);
                }
                if seen.insert(value.clone()) {
                    current = Some(SfpDiagnostics {
                        interface: value,
                        ..SfpDiagnostics::default()
                    });
                } else {
                    parsed.skip(
                        Category::Sfp,
                        idx + 1,
                        SkipReason::Duplicate { key: value },
                        line,
                    );
                }
                continue;
            }

            let Some(record) = current.as_mut() else {
                continue;
            };
            apply_field(record, &label, &value);
        }
    }

    if let Some(done) = current {
        parsed.records.push(done);
    }
    Ok(parsed)
}

fn apply_field(record: &mut SfpDiagnostics, label: &str, value: &str) {
    let text = || (!is_absent(value)).then(|| value.to_string());
    let decimal = || (!is_absent(value)).then(|| first_decimal(value)).flatten();

    match label {
        "vendor-name" => record.vendor_name = text(),
        "vendor-part-number" | "part-number" => record.part_number = text(),
        "vendor-serial-number" | "serial-number" => record.serial_number = text(),
        "temperature" => record.temperature_c = decimal(),
        "voltage" | "supply-voltage" => record.voltage_v = decimal(),
        "tx-power" => record.tx_power_dbm = decimal(),
        "rx-power" => record.rx_power_dbm = decimal(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL: &str = "\
===============================================================================
sfp diagnostics
===============================================================================
sfp-faceplate-number : nt-a:xfp:1             vendor-name : ALCATEL
vendor-part-number : 3FE12345AA               vendor-serial-number : XYZ123
temperature : 38.5 degrees Celsius            voltage : 3.29 VDC
tx-power : -2.10 dBm                          rx-power : N/A
-------------------------------------------------------------------------------
sfp-faceplate-number : lt:1/1/1:sfp:3         vendor-name : SOURCEPHOTONICS
temperature : 41 degrees Celsius              voltage : 3.31 VDC
tx-power : 3.52 dBm                           rx-power : -24.15 dBm
-------------------------------------------------------------------------------
sfp-faceplate-number : nt-a:xfp:1             vendor-name : ALCATEL
===============================================================================";

    #[test]
    fn test_sfp_records() {
        let parsed = parse_sfp_diagnostics(DETAIL).unwrap();
        assert_eq!(parsed.records.len(), 2);

        let first = &parsed.records[0];
        assert_eq!(first.interface, "nt-a:xfp:1");
        assert_eq!(first.vendor_name.as_deref(), Some("ALCATEL"));
        assert_eq!(first.part_number.as_deref(), Some("3FE12345AA"));
        assert_eq!(first.serial_number.as_deref(), Some("XYZ123"));
        assert_eq!(first.temperature_c, Some(38.5));
        assert_eq!(first.voltage_v, Some(3.29));
        assert_eq!(first.tx_power_dbm, Some(-2.10));
        assert_eq!(first.rx_power_dbm, None);

        let second = &parsed.records[1];
        assert_eq!(second.interface, "lt:1/1/1:sfp:3");
        assert_eq!(second.rx_power_dbm, Some(-24.15));
        assert_eq!(second.part_number, None);
    }

    #[test]
    fn test_repeated_interface_is_skipped() {
        let parsed = parse_sfp_diagnostics(DETAIL).unwrap();
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].line, 13);
    }
}
