//! Token-level helpers shared by the row grammars.

use super::SkipReason;
use regex::Regex;
use std::sync::LazyLock;

static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-+]?\d+(?:\.\d+)?").unwrap());

/// `label : value` pairs; labels are hyphenated identifiers, values run to the next label.
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)([a-z][a-z0-9_\-]*)\s*:(?:\s+|$)").unwrap());

/// True for interface paths such as `1/1/1/1` or `1/1/1/1/5/14/1`.
pub fn is_path(token: &str) -> bool {
    token.contains('/')
        && token
            .split('/')
            .all(|seg| !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit()))
}

pub fn number(field: &'static str, token: &str) -> Result<f64, SkipReason> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SkipReason::InvalidField {
            field,
            value: token.to_string(),
        })
}

pub fn integer<T: std::str::FromStr>(field: &'static str, token: &str) -> Result<T, SkipReason> {
    token
        .trim()
        .parse::<T>()
        .map_err(|_| SkipReason::InvalidField {
            field,
            value: token.to_string(),
        })
}

/// The first decimal number inside a free-text value, e.g. `-2.10 dBm`.
pub fn first_decimal(value: &str) -> Option<f64> {
    DECIMAL_RE
        .find(value)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Placeholders the device prints for absent values.
pub fn is_absent(value: &str) -> bool {
    let v = value.trim();
    v.is_empty()
        || v == "-"
        || ["n/a", "na", "none", "unknown", "not-available", "undefined"]
            .iter()
            .any(|p| v.eq_ignore_ascii_case(p))
}

/// Extract every `label : value` pair on a line, labels lowercased.
pub fn label_values(line: &str) -> Vec<(String, String)> {
    let matches: Vec<_> = LABEL_RE.captures_iter(line).collect();
    let mut pairs = Vec::with_capacity(matches.len());

    for (i, caps) in matches.iter().enumerate() {
        let (Some(label), Some(whole)) = (caps.get(1), caps.get(0)) else {
            continue;
        };
        let value_end = matches
            .get(i + 1)
            .and_then(|next| next.get(1))
            .map(|next_label| next_label.start())
            .unwrap_or(line.len());
        let value = line[whole.end()..value_end.max(whole.end())].trim();
        pairs.push((label.as_str().to_ascii_lowercase(), value.to_string()));
    }

    pairs
}

/// Split off the first `n` whitespace-separated tokens, returning them and the remainder.
pub fn leading_tokens(line: &str, n: usize) -> (Vec<&str>, &str) {
    let mut tokens = Vec::with_capacity(n);
    let mut rest = line;
    while tokens.len() < n {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            rest = trimmed;
            break;
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        tokens.push(&trimmed[..end]);
        rest = &trimmed[end..];
    }
    (tokens, rest)
}

/// Split a line on runs of two or more spaces.
pub fn wide_columns(line: &str) -> Vec<&str> {
    line.split("  ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
