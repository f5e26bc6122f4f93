use std::time::{Duration, Instant};

/// Format a `Duration` as a human-readable string with automatic unit scaling.
///
/// Produces output like `1.94ms`, `2.34s`, `150.00µs` using Rust's Debug format.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}

/// Warn when the time since `start` exceeds `threshold`.
pub fn log_if_slow(start: Instant, threshold: Duration, operation: &str) {
    let elapsed = start.elapsed();
    if elapsed > threshold {
        tracing::warn!(
            operation,
            duration = fmt_duration(elapsed),
            threshold = fmt_duration(threshold),
            "Slow operation"
        );
    }
}

/// The last `max_chars` characters of `text` on a single line, for log fields.
pub fn tail_preview(text: &str, max_chars: usize) -> String {
    let flat: Vec<char> = text
        .trim_end()
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    match flat.len().checked_sub(max_chars) {
        Some(skip) if skip > 0 => {
            let tail: String = flat[skip..].iter().collect();
            format!("…{tail}")
        }
        _ => flat.into_iter().collect(),
    }
}
