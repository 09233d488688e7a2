//! Flat-file record codec: a JSON array of objects, one object per record.
//!
//! Decoding never fails. When the whole document parses, records that do not
//! match the expected shape are skipped individually. When it does not parse
//! (truncated write, stray bytes after a power cut), the array is scanned
//! object by object and whatever still decodes is kept.

use domains::{DomainError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialises `records` as a JSON array followed by a newline.
pub fn encode<T: Serialize>(records: &[T]) -> Result<Vec<u8>> {
    let mut out = serde_json::to_vec(records).map_err(|e| DomainError::Encoding(e.to_string()))?;
    out.push(b'\n');
    Ok(out)
}

pub fn decode_tolerant<T: DeserializeOwned>(data: &[u8]) -> Vec<T> {
    if let Ok(values) = serde_json::from_slice::<Vec<serde_json::Value>>(data) {
        return values
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed record");
                    None
                }
            })
            .collect();
    }

    let text = String::from_utf8_lossy(data);
    let objects = scan_objects(&text);
    tracing::warn!(recovered = objects.len(), "record file is damaged; decoding objects one by one");
    objects
        .into_iter()
        .filter_map(|object| serde_json::from_str(object).ok())
        .collect()
}

/// Returns the top-level `{...}` slices inside the first `[` of `text`.
/// Braces inside quoted strings are ignored. An unterminated trailing object
/// is dropped.
pub fn scan_objects(text: &str) -> Vec<&str> {
    let Some(open) = text.find('[') else {
        return Vec::new();
    };

    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[open + 1..].char_indices() {
        let index = open + 1 + offset;
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = index;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    objects.push(&text[start..=index]);
                }
            }
            ']' if depth == 0 => break,
            _ => {}
        }
    }
    objects
}
