//! Per-category normalized records.
//!
//! Each `from_raw` reads the canonical fields through a [`ResolvedSchema`], converts quantities to
//! base units and normalizes the free-text fields used for lookups. Any problem is a
//! [`SkipReason`] for that record only.

use crate::config::lookup_key;
use crate::estimate::SkipReason;
use crate::types::RawRecord;

use super::schema::{CanonicalField, ResolvedSchema};
use super::units::{self, Dimension, Quantity};

/// Entity used when a record carries none.
pub const UNKNOWN_ENTITY: &str = "Unknown";

/// Transport records carry no unit columns unless mapped; these are the implied units.
pub const DEFAULT_TRANSPORT_WEIGHT_UNIT: &str = "lb";
pub const DEFAULT_TRANSPORT_DISTANCE_UNIT: &str = "mile";

fn source_file(raw: &RawRecord) -> String {
    if raw.source_file.is_empty() {
        "unknown".to_string()
    } else {
        raw.source_file.clone()
    }
}

fn entity(schema: &ResolvedSchema, raw: &RawRecord) -> String {
    schema
        .text(CanonicalField::Entity, raw)
        .unwrap_or_else(|| UNKNOWN_ENTITY.to_string())
}

fn required_text(
    schema: &ResolvedSchema,
    field: CanonicalField,
    raw: &RawRecord,
) -> Result<String, SkipReason> {
    schema
        .text(field, raw)
        .ok_or(SkipReason::MissingValue { field })
}

fn required_number(
    schema: &ResolvedSchema,
    field: CanonicalField,
    raw: &RawRecord,
) -> Result<f64, SkipReason> {
    let value = schema
        .value(field, raw)
        .ok_or(SkipReason::MissingValue { field })?;
    value
        .as_f64()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| SkipReason::InvalidNumber {
            field,
            raw: value.as_text().unwrap_or_default(),
        })
}

/// A material consumption record with mass in kilograms.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRecord {
    pub entity: String,
    /// Material as written in the source (trimmed).
    pub material: String,
    pub weight_kg: f64,
    pub source_file: String,
}

impl MaterialRecord {
    pub fn from_raw(raw: &RawRecord, schema: &ResolvedSchema) -> Result<Self, SkipReason> {
        let material = required_text(schema, CanonicalField::Material, raw)?;
        let weight = required_number(schema, CanonicalField::Weight, raw)?;
        let unit = required_text(schema, CanonicalField::Unit, raw)?;
        let Quantity { value, .. } = units::to_base(Dimension::Mass, weight, &unit)?;

        Ok(Self {
            entity: entity(schema, raw),
            material,
            weight_kg: value,
            source_file: source_file(raw),
        })
    }

    pub fn lookup_key(&self) -> String {
        lookup_key(&self.material)
    }
}

/// A freight movement with mass in kilograms and distance in kilometers.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRecord {
    pub entity: String,
    pub product: String,
    /// Mode normalized for lookups (lower-case).
    pub mode: String,
    pub weight_kg: f64,
    pub distance_km: f64,
    pub source_file: String,
}

impl TransportRecord {
    pub fn from_raw(raw: &RawRecord, schema: &ResolvedSchema) -> Result<Self, SkipReason> {
        let weight = required_number(schema, CanonicalField::Weight, raw)?;
        let distance = required_number(schema, CanonicalField::Distance, raw)?;
        let mode = required_text(schema, CanonicalField::Mode, raw)?;

        let weight_unit = schema
            .text(CanonicalField::WeightUnit, raw)
            .unwrap_or_else(|| DEFAULT_TRANSPORT_WEIGHT_UNIT.to_string());
        let distance_unit = schema
            .text(CanonicalField::DistanceUnit, raw)
            .unwrap_or_else(|| DEFAULT_TRANSPORT_DISTANCE_UNIT.to_string());

        let weight_kg = units::to_base(Dimension::Mass, weight, &weight_unit)?.value;
        let distance_km = units::to_base(Dimension::Distance, distance, &distance_unit)?.value;

        Ok(Self {
            entity: entity(schema, raw),
            product: schema
                .text(CanonicalField::Product, raw)
                .unwrap_or_else(|| UNKNOWN_ENTITY.to_string()),
            mode: lookup_key(&mode),
            weight_kg,
            distance_km,
            source_file: source_file(raw),
        })
    }

    /// Transport work in tonne-kilometers. Reported only, never sent to the estimator.
    pub fn tonne_km(&self) -> f64 {
        self.weight_kg / 1000.0 * self.distance_km
    }
}

/// Energy carriers with distinct estimation parameter shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyKind {
    /// Estimated from energy (kWh).
    Electricity,
    /// Estimated from gas volume (m3).
    NaturalGas,
    /// Diesel/gasoline, estimated from liquid volume (l).
    LiquidFuel,
}

impl EnergyKind {
    /// Dispatch on a normalized energy-type key.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "electricity" => Some(EnergyKind::Electricity),
            "natural_gas" => Some(EnergyKind::NaturalGas),
            "diesel" | "gasoline" => Some(EnergyKind::LiquidFuel),
            _ => None,
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            EnergyKind::Electricity => Dimension::Energy,
            EnergyKind::NaturalGas => Dimension::GasVolume,
            EnergyKind::LiquidFuel => Dimension::LiquidVolume,
        }
    }
}

/// An energy consumption record, with its quantity in the base unit for its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyRecord {
    pub entity: String,
    /// Energy type as written in the source.
    pub energy_type: String,
    /// Normalized lookup key, e.g. `natural_gas`.
    pub energy_key: String,
    pub kind: EnergyKind,
    pub consumption: f64,
    /// Source unit, lower-cased.
    pub consumption_unit: String,
    pub quantity: Quantity,
    pub location: String,
    pub source_file: String,
}

impl EnergyRecord {
    pub fn from_raw(raw: &RawRecord, schema: &ResolvedSchema) -> Result<Self, SkipReason> {
        let energy_type = required_text(schema, CanonicalField::EnergyType, raw)?;
        let consumption = required_number(schema, CanonicalField::Consumption, raw)?;
        let unit = required_text(schema, CanonicalField::Unit, raw)?.to_lowercase();

        let energy_key = lookup_key(&energy_type);
        let kind = EnergyKind::from_key(&energy_key).ok_or_else(|| SkipReason::UnsupportedEnergyType {
            energy_type: energy_type.clone(),
        })?;
        let quantity = units::to_base(kind.dimension(), consumption, &unit)?;

        Ok(Self {
            entity: entity(schema, raw),
            energy_type,
            energy_key,
            kind,
            consumption,
            consumption_unit: unit,
            quantity,
            location: schema
                .text(CanonicalField::Location, raw)
                .unwrap_or_else(|| UNKNOWN_ENTITY.to_string()),
            source_file: source_file(raw),
        })
    }
}
