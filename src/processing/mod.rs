//! Cross-category processing of estimated results.
//!
//! The processing layer operates on [`crate::estimate::EmissionResult`] values produced by the
//! estimators.
//!
//! Currently implemented:
//!
//! - [`aggregate()`]: per-entity totals and provenance breakdown
//! - [`rank()`]: ordering by a configurable subset of category totals
//! - [`summary_statistics()`] / [`top_ranked()`]: report documents
//!
//! ## Example: aggregate → rank
//!
//! ```rust
//! use std::collections::BTreeMap;
//!
//! use emissions_pipeline::config::RankingConfig;
//! use emissions_pipeline::estimate::{EmissionResult, ResultDetail};
//! use emissions_pipeline::processing::{aggregate, rank};
//! use emissions_pipeline::types::Category;
//!
//! let steel = |entity: &str, co2e: f64| EmissionResult {
//!     entity: entity.to_string(),
//!     detail: ResultDetail::Materials { material: "Steel".into(), weight_kg: 1.0 },
//!     emissions_kg_co2e: co2e,
//!     unit: "kg".into(),
//!     source_file: "materials.csv".into(),
//! };
//!
//! let mut sets = BTreeMap::new();
//! sets.insert(Category::Materials, vec![steel("E1", 50.0), steel("E2", 30.0)]);
//!
//! let aggregates = aggregate(&sets);
//! let ranked = rank(&aggregates, &RankingConfig::default());
//! assert_eq!(ranked[0].aggregate.entity, "E2");
//! assert_eq!(ranked[0].rank, 1);
//! ```

pub mod aggregate;
pub mod rank;
pub mod report;

pub use aggregate::{aggregate, Aggregator, Breakdown, EntityAggregate};
pub use rank::{rank, ranking_emissions, RankedEntity};
pub use report::{summary_statistics, top_file_name, top_ranked, SummaryStatistics};
