//! Schema resolution and unit normalization.
//!
//! - [`schema`]: bind a source's raw columns to canonical fields once per source
//! - [`units`]: fixed conversion of mass/distance/volume/energy into metric base units
//! - [`records`]: typed per-category records built from a raw record and a resolved schema

pub mod records;
pub mod schema;
pub mod units;

pub use records::{EnergyKind, EnergyRecord, MaterialRecord, TransportRecord, UNKNOWN_ENTITY};
pub use schema::{CanonicalField, ResolvedSchema, SchemaConfig};
pub use units::{BaseUnit, Dimension, Quantity};
