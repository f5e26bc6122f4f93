use super::fields::{is_absent, label_values};
use super::ParseError;
use crate::data::models::{Category, SystemInfo, Uptime};
use regex::Regex;
use std::sync::LazyLock;

static UPTIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:(\d+)\s*days?\s*,?\s*)?(\d{1,2}):(\d{2}):(\d{2})").unwrap()
});

/// Labels that carry the software release in `show software-mngt version etsi`.
const RELEASE_LABELS: [&str; 3] = ["isam-release", "release", "software-version"];

/// Combine the version and uptime outputs into one [`SystemInfo`].
///
/// An uptime that does not match `N days, H:M:S` yields a zeroed [`Uptime`] with
/// `parsed = false`, keeping the raw text.
pub fn parse_system_info(version_raw: &str, uptime_raw: &str) -> Result<SystemInfo, ParseError> {
    if version_raw.trim().is_empty() && uptime_raw.trim().is_empty() {
        return Err(ParseError::EmptyInput {
            category: Category::SystemInfo,
        });
    }

    Ok(SystemInfo {
        software_release: parse_release(version_raw),
        uptime: parse_uptime(uptime_raw),
    })
}

fn parse_release(raw: &str) -> Option<String> {
    raw.lines()
        .flat_map(label_values)
        .find(|(label, _)| RELEASE_LABELS.contains(&label.as_str()))
        .map(|(_, value)| value)
        .filter(|value| !is_absent(value))
}

pub fn parse_uptime(raw: &str) -> Uptime {
    let line = raw
        .lines()
        .find(|line| UPTIME_RE.is_match(line))
        .or_else(|| raw.lines().find(|line| !line.trim().is_empty()))
        .unwrap_or("");
    let raw_value = match line.split_once(':') {
        Some((label, value)) if !label.trim().chars().all(|c| c.is_ascii_digit()) => value.trim(),
        _ => line.trim(),
    }
    .to_string();

    let Some(caps) = UPTIME_RE.captures(line) else {
        return Uptime {
            raw: raw_value,
            ..Uptime::default()
        };
    };

    let field = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0)
    };
    Uptime {
        days: field(1),
        hours: field(2),
        minutes: field(3),
        seconds: field(4),
        raw: raw_value,
        parsed: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSION: &str = "\
===============================================================================
etsi table
===============================================================================
vendor-id : ALCL              isam-release : R6.2.04m
equip-id : 1234               ont-sw-release : 3FE-12345
===============================================================================";

    const UPTIME: &str = "System Up Time         : 12 days, 3:04:05.00 (hr:min:sec)";

    #[test]
    fn test_release_and_uptime() {
        let info = parse_system_info(VERSION, UPTIME).unwrap();
        assert_eq!(info.software_release.as_deref(), Some("R6.2.04m"));
        assert_eq!(
            (info.uptime.days, info.uptime.hours, info.uptime.minutes, info.uptime.seconds),
            (12, 3, 4, 5)
        );
        assert!(info.uptime.parsed);
        assert_eq!(info.uptime.raw, "12 days, 3:04:05.00 (hr:min:sec)");
    }

    #[test]
    fn test_uptime_without_days() {
        let uptime = parse_uptime("core1 uptime : 7:08:09");
        assert!(uptime.parsed);
        assert_eq!((uptime.days, uptime.hours), (0, 7));
    }

    #[test]
    fn test_unparsable_uptime_is_zeroed() {
        let info = parse_system_info(VERSION, "uptime : unavailable").unwrap();
        assert!(!info.uptime.parsed);
        assert_eq!(info.uptime.days, 0);
        assert_eq!(info.uptime.raw, "unavailable");
    }

    #[test]
    fn test_empty_outputs() {
        assert!(parse_system_info("", " ").is_err());
    }
}
