//! `emissions-pipeline` turns heterogeneous activity records (purchased materials, freight
//! movements, energy consumption) into per-entity greenhouse-gas estimates.
//!
//! A run is configured by one JSON document (see [`config`]) and proceeds in stages:
//!
//! 1. [`ingestion::UniversalLoader`] reads every file matching a source's location patterns
//!    into one [`types::RecordSet`] (CSV, JSON, XML and, with the default `excel` feature,
//!    spreadsheets).
//! 2. [`normalize::ResolvedSchema`] maps the source's columns onto canonical fields; quantities
//!    are normalized to kilograms, kilometres, kWh, cubic metres or litres.
//! 3. A category estimator resolves each record to an emission-factor id and asks an
//!    [`estimate::EstimationClient`] for kg CO2e. Per-record problems skip the record, they never
//!    abort the batch.
//! 4. Results are persisted per category ([`output`]), folded per entity
//!    ([`processing::aggregate()`]) and ranked ([`processing::rank()`]).
//!
//! [`pipeline::Pipeline`] sequences all of this; each stage can also be run alone since stages
//! communicate through the persisted files.
//!
//! ## Quick example: estimate with a custom client
//!
//! ```no_run
//! use emissions_pipeline::config::PipelineConfig;
//! use emissions_pipeline::error::EstimationError;
//! use emissions_pipeline::estimate::{Estimate, EstimationClient, EstimationRequest};
//! use emissions_pipeline::pipeline::Pipeline;
//!
//! struct Flat;
//!
//! impl EstimationClient for Flat {
//!     fn estimate(&self, _request: &EstimationRequest) -> Result<Estimate, EstimationError> {
//!         Ok(Estimate { co2e: 1.0, co2e_unit: "kg".into() })
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::from_path("config.json")?;
//! let summary = Pipeline::new(&config, &Flat)?.run()?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: configuration document and lookup-key normalization
//! - [`ingestion`]: format readers, the loader and load observers
//! - [`normalize`]: schema resolution, units and typed per-category records
//! - [`estimate`]: estimation client and category estimators
//! - [`execution`]: bounded worker pool for concurrent estimation
//! - [`processing`]: aggregation, ranking and report documents
//! - [`output`]: persisted artifacts
//! - [`error`]: error types per layer

pub mod config;
pub mod error;
pub mod estimate;
pub mod execution;
pub mod ingestion;
pub mod logging;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod processing;
pub mod types;

pub use error::{LoadError, LoadResult, PipelineError};
pub use pipeline::{Pipeline, RunSummary};
