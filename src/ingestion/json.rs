//! JSON reader.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]`
//! - A single object: `{"a":1}`
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! Nested objects are flattened into dot-path field names (e.g. `shipment.weight`).

use std::fs;
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::types::{RawRecord, Value};

/// Read a JSON file into raw records tagged with `source_file`.
pub fn read_json_from_path(path: impl AsRef<Path>, source_file: &str) -> LoadResult<Vec<RawRecord>> {
    let text = fs::read_to_string(path)?;
    read_json_from_str(&text, source_file)
}

/// Read JSON from an in-memory string.
pub fn read_json_from_str(input: &str, source_file: &str) -> LoadResult<Vec<RawRecord>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    // First try parsing as a single JSON value (array or object).
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        match v {
            serde_json::Value::Array(items) => json_values_to_records(&items, source_file),
            serde_json::Value::Object(_) => json_values_to_records(std::slice::from_ref(&v), source_file),
            _ => Err(LoadError::Malformed {
                message: "json must be an object, an array of objects, or NDJSON".to_string(),
            }),
        }
    } else {
        // Fall back to NDJSON.
        let mut values = Vec::new();
        for (i, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| LoadError::Malformed {
                message: format!("invalid ndjson at line {}: {}", i + 1, e),
            })?;
            values.push(v);
        }
        json_values_to_records(&values, source_file)
    }
}

fn json_values_to_records(values: &[serde_json::Value], source_file: &str) -> LoadResult<Vec<RawRecord>> {
    let mut records = Vec::with_capacity(values.len());

    for (idx0, v) in values.iter().enumerate() {
        let obj = v.as_object().ok_or_else(|| LoadError::Malformed {
            message: format!("row {} is not a json object", idx0 + 1),
        })?;

        let mut record = RawRecord::new(source_file);
        flatten_into(&mut record, "", obj);
        records.push(record);
    }

    Ok(records)
}

fn flatten_into(record: &mut RawRecord, prefix: &str, obj: &serde_json::Map<String, serde_json::Value>) {
    for (key, value) in obj {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            serde_json::Value::Object(inner) => flatten_into(record, &name, inner),
            other => record.insert(name, convert_json_value(other)),
        }
    }
}

fn convert_json_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int64(i),
            None => n.as_f64().map(Value::Float64).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::from_text(s),
        // Arrays have no scalar meaning here; keep their text for auditing.
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => Value::Utf8(v.to_string()),
    }
}
