//! CSV reader.

use std::path::Path;

use crate::error::LoadResult;
use crate::types::{RawRecord, Value};

/// Read a CSV file into raw records tagged with `source_file`.
///
/// Rules:
///
/// - The first line is the header.
/// - Cells are kept as text; blank cells become [`Value::Null`].
/// - Short rows are padded with nulls; fully blank rows are dropped.
pub fn read_csv_from_path(path: impl AsRef<Path>, source_file: &str) -> LoadResult<Vec<RawRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    read_csv_from_reader(&mut rdr, source_file)
}

/// Read CSV data from an existing CSV reader.
pub fn read_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    source_file: &str,
) -> LoadResult<Vec<RawRecord>> {
    let headers = rdr.headers()?.clone();

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut record = RawRecord::new(source_file);
        for (idx, name) in headers.iter().enumerate() {
            if name.trim().is_empty() {
                continue;
            }
            let value = row.get(idx).map(Value::from_text).unwrap_or(Value::Null);
            record.insert(name, value);
        }
        records.push(record);
    }

    Ok(records)
}
