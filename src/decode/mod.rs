//! JSON record decoding
//!
//! Input objects come in three shapes: a single JSON object per file
//! (catalog data), one JSON object per line (event data), or a
//! top-level array. All three decode to `Vec<T>`.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;

/// Decode all records from one input object body
///
/// The `path` only labels errors; a malformed body or a record missing
/// a required field aborts the stage.
pub fn decode_records<T: DeserializeOwned>(path: &str, body: &str) -> Result<Vec<T>> {
    let trimmed = body.trim_start();

    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<T>>(trimmed)
            .map_err(|e| Error::decode(path, e.to_string()));
    }

    // One object per line; a single-object file is a one-line case of this
    let mut records = Vec::new();
    for (line_num, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: T = serde_json::from_str(line)
            .map_err(|e| Error::decode(path, format!("line {}: {e}", line_num + 1)))?;
        records.push(record);
    }

    Ok(records)
}
