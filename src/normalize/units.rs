//! Fixed per-dimension unit conversion into metric base units.
//!
//! The table is not configurable. An unrecognized unit is a per-record [`UnitError`].

use std::fmt;

use crate::config::lookup_key;
use crate::error::UnitError;

/// Physical dimension of a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Mass,
    Distance,
    /// Liquid fuel volume.
    LiquidVolume,
    /// Gaseous fuel volume.
    GasVolume,
    Energy,
}

impl Dimension {
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Mass => "mass",
            Dimension::Distance => "distance",
            Dimension::LiquidVolume => "liquid volume",
            Dimension::GasVolume => "gas volume",
            Dimension::Energy => "energy",
        }
    }

    pub fn base_unit(&self) -> BaseUnit {
        match self {
            Dimension::Mass => BaseUnit::Kilogram,
            Dimension::Distance => BaseUnit::Kilometer,
            Dimension::LiquidVolume => BaseUnit::Liter,
            Dimension::GasVolume => BaseUnit::CubicMeter,
            Dimension::Energy => BaseUnit::KilowattHour,
        }
    }

    /// Multiplier from `unit` to this dimension's base unit.
    pub fn factor(&self, unit: &str) -> Option<f64> {
        let unit = lookup_key(unit);
        let factor = match (self, unit.as_str()) {
            (Dimension::Mass, "kg" | "kgs" | "kilogram" | "kilograms") => 1.0,
            (Dimension::Mass, "g" | "gram" | "grams") => 1.0 / 1000.0,
            (Dimension::Mass, "t" | "ton" | "tons" | "tonne" | "tonnes" | "metric_ton" | "metric_tons") => 1000.0,
            (Dimension::Mass, "lb" | "lbs" | "pound" | "pounds") => 0.453592,

            (Dimension::Distance, "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres") => 1.0,
            (Dimension::Distance, "mi" | "mile" | "miles") => 1.60934,

            (Dimension::LiquidVolume, "l" | "liter" | "liters" | "litre" | "litres") => 1.0,
            (Dimension::LiquidVolume, "gal" | "gallon" | "gallons") => 3.78541,

            (Dimension::GasVolume, "m3" | "m³" | "cubic_meter" | "cubic_meters" | "cubic_metre" | "cubic_metres") => 1.0,

            (Dimension::Energy, "kwh" | "kilowatt-hour" | "kilowatt-hours" | "kilowatt_hour" | "kilowatt_hours") => 1.0,
            (Dimension::Energy, "mwh" | "megawatt-hour" | "megawatt-hours" | "megawatt_hour" | "megawatt_hours") => 1000.0,

            _ => return None,
        };
        Some(factor)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical metric unit of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseUnit {
    Kilogram,
    Kilometer,
    Liter,
    CubicMeter,
    KilowattHour,
}

impl BaseUnit {
    /// Unit symbol as the estimation service expects it.
    pub fn symbol(&self) -> &'static str {
        match self {
            BaseUnit::Kilogram => "kg",
            BaseUnit::Kilometer => "km",
            BaseUnit::Liter => "l",
            BaseUnit::CubicMeter => "m3",
            BaseUnit::KilowattHour => "kWh",
        }
    }
}

/// A value expressed in a base unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: BaseUnit,
}

/// Convert `value` in `unit` into the base unit of `dimension`.
pub fn to_base(dimension: Dimension, value: f64, unit: &str) -> Result<Quantity, UnitError> {
    if !value.is_finite() {
        return Err(UnitError::NotFinite { value });
    }
    let factor = dimension.factor(unit).ok_or_else(|| UnitError::Unrecognized {
        dimension: dimension.name(),
        unit: unit.trim().to_string(),
    })?;
    Ok(Quantity {
        value: value * factor,
        unit: dimension.base_unit(),
    })
}

/// Convert a base-unit `value` back into `unit`.
pub fn from_base(dimension: Dimension, value: f64, unit: &str) -> Result<f64, UnitError> {
    let factor = dimension.factor(unit).ok_or_else(|| UnitError::Unrecognized {
        dimension: dimension.name(),
        unit: unit.trim().to_string(),
    })?;
    Ok(value / factor)
}
