//! Entity ranking.

use serde::{Deserialize, Serialize};

use crate::config::RankingConfig;
use crate::estimate::round_to;
use crate::types::Category;

use super::aggregate::EntityAggregate;

/// An aggregate with its ranking metric and 1-based position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntity {
    #[serde(flatten)]
    pub aggregate: EntityAggregate,
    pub ranking_emissions: f64,
    pub rank: usize,
}

/// Sum of the `categories` totals of one aggregate.
pub fn ranking_emissions(aggregate: &EntityAggregate, categories: &[Category]) -> f64 {
    round_to(
        categories.iter().map(|c| aggregate.category_total(*c)).sum(),
        4,
    )
}

/// Order aggregates by their ranking metric.
///
/// The sort is stable: entities with equal metrics keep their input order in both directions.
/// Ranks are contiguous from 1; ties do not share a rank.
pub fn rank(aggregates: &[EntityAggregate], config: &RankingConfig) -> Vec<RankedEntity> {
    let mut scored: Vec<(f64, &EntityAggregate)> = aggregates
        .iter()
        .map(|a| (ranking_emissions(a, &config.categories), a))
        .collect();

    if config.ascending {
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    } else {
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    }

    scored
        .into_iter()
        .enumerate()
        .map(|(idx, (metric, aggregate))| RankedEntity {
            aggregate: aggregate.clone(),
            ranking_emissions: metric,
            rank: idx + 1,
        })
        .collect()
}
