//! XML reader.
//!
//! Flattens one level: every element child of the document root is a record, and each of its
//! element children becomes a field named by tag, valued by its trimmed text.

use std::fs;
use std::path::Path;

use crate::error::LoadResult;
use crate::types::{RawRecord, Value};

/// Read an XML file into raw records tagged with `source_file`.
pub fn read_xml_from_path(path: impl AsRef<Path>, source_file: &str) -> LoadResult<Vec<RawRecord>> {
    let text = fs::read_to_string(path)?;
    read_xml_from_str(&text, source_file)
}

/// Read XML from an in-memory string.
pub fn read_xml_from_str(input: &str, source_file: &str) -> LoadResult<Vec<RawRecord>> {
    let doc = roxmltree::Document::parse(input)?;

    let records = doc
        .root_element()
        .children()
        .filter(|n| n.is_element())
        .map(|row| {
            let mut record = RawRecord::new(source_file);
            for field in row.children().filter(|n| n.is_element()) {
                let value = field.text().map(Value::from_text).unwrap_or(Value::Null);
                record.insert(field.tag_name().name(), value);
            }
            record
        })
        .collect();

    Ok(records)
}
