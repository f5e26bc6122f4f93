//! JSON decoding with path-aware error messages for feed pages.

/// Parse JSON and, on failure, describe where it failed: the serde path, the type
/// mismatch, and a snippet of the offending line.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, String> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(jd).map_err(|err| {
        let inner = err.inner();
        let (line, column) = (inner.line(), inner.column());
        let path = err.path().to_string();

        let msg = inner.to_string();
        let loc = format!(" at line {line} column {column}");
        let msg = msg.strip_suffix(&loc).unwrap_or(&msg);

        let mut out = String::new();
        if !path.is_empty() && path != "." {
            out.push_str(&format!("at path '{path}': "));
        }
        out.push_str(&format!(
            "{} (line {line} col {column})\n{}",
            describe_mismatch(msg),
            snippet(body, line, column, 20)
        ));
        out
    })
}

/// Rewrite "invalid type: X, expected Y" as "expected Y, got X".
fn describe_mismatch(msg: &str) -> String {
    if let Some(rest) = msg.strip_prefix("invalid type: ")
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {}, got {actual}", expected.trim());
    }
    msg.to_string()
}

fn snippet(body: &str, line: usize, column: usize, context_len: usize) -> String {
    let target: Vec<char> = body
        .lines()
        .nth(line.saturating_sub(1))
        .unwrap_or("")
        .chars()
        .collect();
    if target.is_empty() {
        return "(empty line)".to_string();
    }

    let error_idx = column.saturating_sub(1).min(target.len());
    let half = context_len / 2;
    let start = error_idx.saturating_sub(half);
    let end = (error_idx + half).min(target.len());

    let slice: String = target[start..end].iter().collect();
    let indicator = " ".repeat(error_idx - start) + "^";
    format!("...{slice}...\n   {indicator}")
}
