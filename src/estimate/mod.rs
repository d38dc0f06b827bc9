//! Category estimators.
//!
//! Each category turns a normalized record into at most one [`EmissionResult`] by resolving a
//! lookup key and calling the [`EstimationClient`]. Every record ends in a [`RecordOutcome`];
//! nothing a single record does can abort its batch.

pub mod client;
mod energy;
mod materials;
mod transport;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::error::{EstimationError, UnitError};
use crate::execution::ExecutionEngine;
use crate::normalize::{CanonicalField, ResolvedSchema, UNKNOWN_ENTITY};
use crate::types::{Category, RawRecord, RecordSet};

pub use client::{
    EmissionFactorRef, Estimate, EstimationClient, EstimationRequest, HttpEstimationClient, Parameters,
};
pub use energy::EnergyEstimator;
pub use materials::MaterialsEstimator;
pub use transport::TransportEstimator;

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Why a record produced no result without any service fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("missing value for {field:?}")]
    MissingValue { field: CanonicalField },

    #[error("invalid quantity '{raw}' for {field:?}")]
    InvalidNumber { field: CanonicalField, raw: String },

    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error("'{value}' is not in the allow-list")]
    NotAllowed { value: String },

    #[error("no emission factor for '{key}'")]
    MissingFactor { key: String },

    #[error("unsupported energy type '{energy_type}'")]
    UnsupportedEnergyType { energy_type: String },

    #[error("no intermodal leg is allowed and resolvable")]
    NoSurvivingLegs,
}

impl SkipReason {
    /// Stable label used for skip counts.
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::MissingValue { .. } => "missing_value",
            SkipReason::InvalidNumber { .. } => "invalid_number",
            SkipReason::Unit(_) => "unknown_unit",
            SkipReason::NotAllowed { .. } => "not_allowed",
            SkipReason::MissingFactor { .. } => "missing_factor",
            SkipReason::UnsupportedEnergyType { .. } => "unsupported_energy_type",
            SkipReason::NoSurvivingLegs => "no_surviving_legs",
        }
    }
}

/// What happened to one input record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Estimated(EmissionResult),
    Skipped(SkipReason),
    Failed(EstimationError),
}

/// One estimated intermodal leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegEstimate {
    pub mode: String,
    pub distance_km: f64,
    pub proportion: f64,
    pub emissions_kg_co2e: f64,
}

/// Category-specific fields of a result. Serialized inline with a `category` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum ResultDetail {
    Materials {
        material: String,
        weight_kg: f64,
    },
    Transport {
        product: String,
        mode: String,
        weight_kg: f64,
        distance_km: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tonne_km: Option<f64>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        legs: Vec<LegEstimate>,
    },
    Energy {
        energy_type: String,
        consumption: f64,
        consumption_unit: String,
        location: String,
        normalized_consumption: f64,
        normalized_unit: String,
    },
}

impl ResultDetail {
    pub fn category(&self) -> Category {
        match self {
            ResultDetail::Materials { .. } => Category::Materials,
            ResultDetail::Transport { .. } => Category::Transport,
            ResultDetail::Energy { .. } => Category::Energy,
        }
    }
}

/// A persisted per-record estimate. `emissions_kg_co2e` is always finite and non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionResult {
    pub entity: String,
    #[serde(flatten)]
    pub detail: ResultDetail,
    pub emissions_kg_co2e: f64,
    pub unit: String,
    pub source_file: String,
}

impl EmissionResult {
    pub fn category(&self) -> Category {
        self.detail.category()
    }
}

/// Turns raw records of one category into outcomes.
pub trait CategoryEstimator: Sync {
    type Record: Send;

    fn category(&self) -> Category;

    /// Build the typed record. Runs before any service call.
    fn normalize(&self, raw: &RawRecord, schema: &ResolvedSchema) -> Result<Self::Record, SkipReason>;

    /// Resolve factors and call the service for one normalized record.
    fn estimate(&self, record: &Self::Record) -> RecordOutcome;
}

/// Results and outcome counts for one category run.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryReport {
    pub category: Category,
    /// Estimated results in input order.
    pub results: Vec<EmissionResult>,
    pub skipped: BTreeMap<&'static str, usize>,
    pub failed: usize,
}

impl CategoryReport {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            results: Vec::new(),
            skipped: BTreeMap::new(),
            failed: 0,
        }
    }

    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Estimated(result) => self.results.push(result),
            RecordOutcome::Skipped(reason) => *self.skipped.entry(reason.kind()).or_default() += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn estimated(&self) -> usize {
        self.results.len()
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn total(&self) -> usize {
        self.estimated() + self.skipped_total() + self.failed
    }
}

impl fmt::Display for CategoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} records, {} estimated, {} failed, {} skipped",
            self.category,
            self.total(),
            self.estimated(),
            self.failed,
            self.skipped_total()
        )?;
        if !self.skipped.is_empty() {
            let parts: Vec<String> = self.skipped.iter().map(|(k, n)| format!("{k}={n}")).collect();
            write!(f, " ({})", parts.join(", "))?;
        }
        Ok(())
    }
}

/// Estimate every record of a source.
///
/// Records may run concurrently on `engine`; outcomes are logged and collected in input order.
pub fn estimate_records<E: CategoryEstimator>(
    estimator: &E,
    records: &RecordSet,
    schema: &ResolvedSchema,
    engine: &ExecutionEngine,
) -> CategoryReport {
    let category = estimator.category();
    let outcomes = engine.map_items(&records.records, |raw| {
        match estimator.normalize(raw, schema) {
            Ok(record) => estimator.estimate(&record),
            Err(reason) => RecordOutcome::Skipped(reason),
        }
    });

    let mut report = CategoryReport::new(category);
    for (raw, outcome) in records.records.iter().zip(outcomes) {
        let entity = schema
            .text(CanonicalField::Entity, raw)
            .unwrap_or_else(|| UNKNOWN_ENTITY.to_string());
        match &outcome {
            RecordOutcome::Estimated(result) => debug!(
                %entity,
                %category,
                emissions_kg_co2e = result.emissions_kg_co2e,
                source_file = %result.source_file,
                "record estimated"
            ),
            RecordOutcome::Skipped(reason @ SkipReason::NotAllowed { .. }) => {
                debug!(%entity, %category, %reason, "record excluded")
            }
            RecordOutcome::Skipped(reason) => warn!(
                %entity,
                %category,
                %reason,
                source_file = %raw.source_file,
                "record skipped"
            ),
            RecordOutcome::Failed(reason) => error!(
                %entity,
                %category,
                %reason,
                source_file = %raw.source_file,
                "estimation failed"
            ),
        }
        report.record(outcome);
    }

    info!(%category, summary = %report, "category estimated");
    report
}
