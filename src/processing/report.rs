//! Structured report documents derived from the aggregate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::RankingConfig;
use crate::estimate::round_to;
use crate::types::Category;

use super::aggregate::EntityAggregate;
use super::rank::{rank, ranking_emissions, RankedEntity};

/// File name of the top-N document, e.g. `top_5_lowest_emissions.json`.
pub fn top_file_name(n: usize, ascending: bool) -> String {
    let direction = if ascending { "lowest" } else { "highest" };
    format!("top_{n}_{direction}_emissions.json")
}

/// The first `config.top_n` ranked entities.
pub fn top_ranked(aggregates: &[EntityAggregate], config: &RankingConfig) -> Vec<RankedEntity> {
    let mut ranked = rank(aggregates, config);
    ranked.truncate(config.top_n);
    ranked
}

/// Run-wide totals over the ranking categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub total_entities: usize,
    pub total_emissions_kg_co2e: f64,
    pub average_emissions_kg_co2e: f64,
    pub category_totals: BTreeMap<Category, f64>,
}

/// Summarize all aggregates. Values are rounded to 2 decimals.
pub fn summary_statistics(aggregates: &[EntityAggregate], config: &RankingConfig) -> SummaryStatistics {
    let total: f64 = aggregates
        .iter()
        .map(|a| ranking_emissions(a, &config.categories))
        .sum();
    let average = if aggregates.is_empty() {
        0.0
    } else {
        total / aggregates.len() as f64
    };

    let category_totals = config
        .categories
        .iter()
        .map(|c| {
            let sum: f64 = aggregates.iter().map(|a| a.category_total(*c)).sum();
            (*c, round_to(sum, 2))
        })
        .collect();

    SummaryStatistics {
        total_entities: aggregates.len(),
        total_emissions_kg_co2e: round_to(total, 2),
        average_emissions_kg_co2e: round_to(average, 2),
        category_totals,
    }
}
