//! Core data model types shared by ingestion, normalization and estimation.
//!
//! Loaded files become [`RawRecord`]s (one per row/object/element), each tagged with the file
//! it came from. All records of one configured source are concatenated into a [`RecordSet`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Activity category. Each category has its own source, estimator and output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Materials,
    Transport,
    Energy,
}

impl Category {
    /// All categories in pipeline order.
    pub const ALL: [Category; 3] = [Category::Materials, Category::Transport, Category::Energy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Materials => "materials",
            Category::Transport => "transport",
            Category::Energy => "energy",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "materials" | "material" => Ok(Category::Materials),
            "transport" => Ok(Category::Transport),
            "energy" => Ok(Category::Energy),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// A single scalar cell value as read from a source file.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Build a value from raw text. Blank text is [`Value::Null`].
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Value::Null
        } else {
            Value::Utf8(trimmed.to_owned())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value. Text is parsed; bools and blanks are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Utf8(s) => s.trim().parse::<f64>().ok(),
            Value::Null | Value::Bool(_) => None,
        }
    }

    /// Text view of the value, trimmed. Blank text is `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Utf8(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_owned())
            }
            Value::Int64(v) => Some(v.to_string()),
            Value::Float64(v) => Some(v.to_string()),
            Value::Bool(v) => Some(v.to_string()),
        }
    }
}

/// One row from a loaded file: raw field name -> scalar value, plus the origin file name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    fields: HashMap<String, Value>,
    /// File name (not full path) the record was read from.
    pub source_file: String,
}

impl RawRecord {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            fields: HashMap::new(),
            source_file: source_file.into(),
        }
    }

    /// Builder-style insert, mostly for tests.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// All records of one source, in file match order then row order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    pub records: Vec<RawRecord>,
}

impl RecordSet {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append the records of one file, preserving order.
    pub fn extend(&mut self, records: Vec<RawRecord>) {
        self.records.extend(records);
    }

    /// Distinct field names across all records, in first-seen order.
    ///
    /// Field order inside a single record is unspecified, so ties within one record are broken
    /// alphabetically to keep the result stable.
    pub fn field_names(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for record in &self.records {
            let mut names: Vec<&str> = record.field_names().collect();
            names.sort_unstable();
            for name in names {
                if !seen.iter().any(|s| s == name) {
                    seen.push(name.to_owned());
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_numeric_view_parses_text() {
        assert_eq!(Value::Utf8(" 12.5 ".into()).as_f64(), Some(12.5));
        assert_eq!(Value::Int64(3).as_f64(), Some(3.0));
        assert_eq!(Value::Utf8("n/a".into()).as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn blank_text_is_null() {
        assert_eq!(Value::from_text("   "), Value::Null);
        assert_eq!(Value::Utf8("  ".into()).as_text(), None);
        assert_eq!(Value::from_text(" Steel "), Value::Utf8("Steel".into()));
    }

    #[test]
    fn record_set_field_names_are_distinct_and_stable() {
        let mut set = RecordSet::default();
        set.extend(vec![
            RawRecord::new("a.csv")
                .with("Weight", Value::Int64(1))
                .with("Material", Value::Null),
            RawRecord::new("b.json")
                .with("Material", Value::Null)
                .with("Entity", Value::Null),
        ]);
        assert_eq!(set.field_names(), vec!["Material", "Weight", "Entity"]);
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("Materials".parse::<Category>(), Ok(Category::Materials));
        assert_eq!(" energy".parse::<Category>(), Ok(Category::Energy));
        assert!("water".parse::<Category>().is_err());
    }
}
