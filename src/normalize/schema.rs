//! Mapping from source columns to canonical fields.
//!
//! A [`SchemaConfig`] says which raw column name carries each [`CanonicalField`]. It is resolved
//! once per source against the columns actually present in the loaded records, producing a
//! [`ResolvedSchema`] whose accessors are then used for every record.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::config::OrderedMap;
use crate::error::SchemaError;
use crate::types::{Category, RawRecord, RecordSet, Value};

/// Semantic fields the estimators read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Entity,
    Material,
    Weight,
    Unit,
    Product,
    Distance,
    Mode,
    EnergyType,
    Consumption,
    Location,
    WeightUnit,
    DistanceUnit,
}

impl CanonicalField {
    /// Parse a schema key. Both `weight_field` and `weight` are accepted.
    pub fn from_config_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        let key = key.strip_suffix("_field").unwrap_or(&key);
        let field = match key {
            "entity" => CanonicalField::Entity,
            "material" => CanonicalField::Material,
            "weight" => CanonicalField::Weight,
            "unit" => CanonicalField::Unit,
            "product" => CanonicalField::Product,
            "distance" => CanonicalField::Distance,
            "mode" => CanonicalField::Mode,
            "energy_type" => CanonicalField::EnergyType,
            "consumption" => CanonicalField::Consumption,
            "location" => CanonicalField::Location,
            "weight_unit" => CanonicalField::WeightUnit,
            "distance_unit" => CanonicalField::DistanceUnit,
            _ => return None,
        };
        Some(field)
    }

    /// Column name used when the schema does not map this field.
    pub fn default_column(&self, category: Category) -> &'static str {
        match (self, category) {
            (CanonicalField::Weight, Category::Transport) => "Weight_lbs",
            (CanonicalField::Weight, _) => "Weight",
            (CanonicalField::Entity, _) => "Entity",
            (CanonicalField::Material, _) => "Material",
            (CanonicalField::Unit, _) => "Unit",
            (CanonicalField::Product, _) => "Product",
            (CanonicalField::Distance, _) => "Distance_miles",
            (CanonicalField::Mode, _) => "Mode",
            (CanonicalField::EnergyType, _) => "EnergyType",
            (CanonicalField::Consumption, _) => "Consumption",
            (CanonicalField::Location, _) => "Location",
            (CanonicalField::WeightUnit, _) => "WeightUnit",
            (CanonicalField::DistanceUnit, _) => "DistanceUnit",
        }
    }
}

/// Whether an estimator can run without a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

/// Fields read by each category's estimator.
pub fn fields_for(category: Category) -> &'static [(CanonicalField, Requirement)] {
    use CanonicalField::*;
    use Requirement::*;
    match category {
        Category::Materials => &[
            (Entity, Optional),
            (Material, Required),
            (Weight, Required),
            (Unit, Required),
        ],
        Category::Transport => &[
            (Entity, Optional),
            (Product, Optional),
            (Weight, Required),
            (Distance, Required),
            (Mode, Required),
            (WeightUnit, Optional),
            (DistanceUnit, Optional),
        ],
        Category::Energy => &[
            (Entity, Optional),
            (EnergyType, Required),
            (Consumption, Required),
            (Unit, Required),
            (Location, Optional),
        ],
    }
}

/// Configured `canonical field -> raw column name` mapping for one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaConfig {
    fields: HashMap<CanonicalField, String>,
}

impl SchemaConfig {
    pub fn with(mut self, field: CanonicalField, raw_name: impl Into<String>) -> Self {
        self.fields.insert(field, raw_name.into());
        self
    }

    /// Raw column name for `field`, falling back to the category default.
    pub fn raw_name(&self, field: CanonicalField, category: Category) -> &str {
        self.fields
            .get(&field)
            .map(String::as_str)
            .unwrap_or_else(|| field.default_column(category))
    }
}

impl<'de> Deserialize<'de> for SchemaConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = OrderedMap::<String>::deserialize(deserializer)?;
        let mut schema = SchemaConfig::default();
        for (key, raw_name) in raw.iter() {
            match CanonicalField::from_config_key(key) {
                Some(field) => {
                    schema.fields.insert(field, raw_name.clone());
                }
                None => warn!(key = key.as_str(), "ignoring unknown schema key"),
            }
        }
        Ok(schema)
    }
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A schema bound to the columns of one loaded source.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    category: Category,
    /// Candidate columns per field: exact matches first, then case-insensitive ones.
    columns: HashMap<CanonicalField, Vec<String>>,
}

impl ResolvedSchema {
    /// Resolve `schema` against the columns present in `records`.
    pub fn resolve(
        records: &RecordSet,
        schema: &SchemaConfig,
        category: Category,
    ) -> Result<Self, SchemaError> {
        Self::resolve_columns(&records.field_names(), schema, category)
    }

    /// Resolve `schema` against a list of available column names.
    ///
    /// Whitespace runs in names are collapsed before comparing. Required fields with no match
    /// fail the whole source; optional ones are simply absent.
    pub fn resolve_columns(
        available: &[String],
        schema: &SchemaConfig,
        category: Category,
    ) -> Result<Self, SchemaError> {
        let mut columns = HashMap::new();
        for &(field, requirement) in fields_for(category) {
            let raw_name = schema.raw_name(field, category);
            let wanted = normalize_name(raw_name);
            let wanted_lower = wanted.to_lowercase();

            let mut matches: Vec<String> = available
                .iter()
                .filter(|c| normalize_name(c) == wanted)
                .cloned()
                .collect();
            for col in available {
                if !matches.contains(col) && normalize_name(col).to_lowercase() == wanted_lower {
                    matches.push(col.clone());
                }
            }

            if matches.is_empty() {
                if requirement == Requirement::Required {
                    return Err(SchemaError::MissingField {
                        category,
                        field,
                        raw_name: raw_name.to_string(),
                    });
                }
                debug!(%category, ?field, raw_name, "optional field absent");
                continue;
            }
            columns.insert(field, matches);
        }
        Ok(Self { category, columns })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn has(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    /// First non-null value for `field` in `record`.
    pub fn value<'r>(&self, field: CanonicalField, record: &'r RawRecord) -> Option<&'r Value> {
        self.columns
            .get(&field)?
            .iter()
            .filter_map(|col| record.get(col))
            .find(|v| !v.is_null())
    }

    /// Trimmed text for `field`, `None` when absent or blank.
    pub fn text(&self, field: CanonicalField, record: &RawRecord) -> Option<String> {
        self.value(field, record).and_then(Value::as_text)
    }
}
