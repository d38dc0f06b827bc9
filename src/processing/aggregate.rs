//! Per-entity aggregation of emission results.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::estimate::{round_to, EmissionResult};
use crate::types::Category;

/// Results that contributed to an aggregate, per category, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    #[serde(default)]
    pub materials: Vec<EmissionResult>,
    #[serde(default)]
    pub transport: Vec<EmissionResult>,
    #[serde(default)]
    pub energy: Vec<EmissionResult>,
}

impl Breakdown {
    pub fn get(&self, category: Category) -> &[EmissionResult] {
        match category {
            Category::Materials => &self.materials,
            Category::Transport => &self.transport,
            Category::Energy => &self.energy,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut Vec<EmissionResult> {
        match category {
            Category::Materials => &mut self.materials,
            Category::Transport => &mut self.transport,
            Category::Energy => &mut self.energy,
        }
    }
}

/// All results of one entity folded together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAggregate {
    pub entity: String,
    pub total_emissions_kg_co2e: f64,
    pub materials_emissions_kg_co2e: f64,
    pub transport_emissions_kg_co2e: f64,
    pub energy_emissions_kg_co2e: f64,
    pub breakdown: Breakdown,
}

impl EntityAggregate {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            total_emissions_kg_co2e: 0.0,
            materials_emissions_kg_co2e: 0.0,
            transport_emissions_kg_co2e: 0.0,
            energy_emissions_kg_co2e: 0.0,
            breakdown: Breakdown::default(),
        }
    }

    pub fn category_total(&self, category: Category) -> f64 {
        match category {
            Category::Materials => self.materials_emissions_kg_co2e,
            Category::Transport => self.transport_emissions_kg_co2e,
            Category::Energy => self.energy_emissions_kg_co2e,
        }
    }

    fn category_total_mut(&mut self, category: Category) -> &mut f64 {
        match category {
            Category::Materials => &mut self.materials_emissions_kg_co2e,
            Category::Transport => &mut self.transport_emissions_kg_co2e,
            Category::Energy => &mut self.energy_emissions_kg_co2e,
        }
    }

    fn add(&mut self, result: EmissionResult) {
        let category = result.category();
        *self.category_total_mut(category) += result.emissions_kg_co2e;
        self.total_emissions_kg_co2e += result.emissions_kg_co2e;
        self.breakdown.get_mut(category).push(result);
    }

    fn absorb(&mut self, other: EntityAggregate) {
        self.total_emissions_kg_co2e += other.total_emissions_kg_co2e;
        for category in Category::ALL {
            *self.category_total_mut(category) += other.category_total(category);
        }
        let Breakdown {
            materials,
            transport,
            energy,
        } = other.breakdown;
        self.breakdown.materials.extend(materials);
        self.breakdown.transport.extend(transport);
        self.breakdown.energy.extend(energy);
    }

    fn rounded(mut self) -> Self {
        self.total_emissions_kg_co2e = round_to(self.total_emissions_kg_co2e, 4);
        for category in Category::ALL {
            let total = self.category_total_mut(category);
            *total = round_to(*total, 4);
        }
        self
    }
}

/// Folds results into per-entity aggregates.
///
/// Entities are keyed by exact string equality and kept in first-seen order. Totals are summed
/// unrounded and rounded to 4 decimals only in [`Aggregator::finish`].
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    index: HashMap<String, usize>,
    entries: Vec<EntityAggregate>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, entity: &str) -> &mut EntityAggregate {
        let idx = match self.index.get(entity) {
            Some(&idx) => idx,
            None => {
                self.entries.push(EntityAggregate::new(entity));
                self.index.insert(entity.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx]
    }

    pub fn add(&mut self, result: EmissionResult) {
        let entity = result.entity.clone();
        self.entry(&entity).add(result);
    }

    /// Combine with another partial fold. Entities new to `self` follow its own.
    pub fn merge(mut self, other: Aggregator) -> Self {
        for aggregate in other.entries {
            let entity = aggregate.entity.clone();
            self.entry(&entity).absorb(aggregate);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Vec<EntityAggregate> {
        self.entries.into_iter().map(EntityAggregate::rounded).collect()
    }
}

impl Extend<EmissionResult> for Aggregator {
    fn extend<I: IntoIterator<Item = EmissionResult>>(&mut self, iter: I) {
        for result in iter {
            self.add(result);
        }
    }
}

impl FromIterator<EmissionResult> for Aggregator {
    fn from_iter<I: IntoIterator<Item = EmissionResult>>(iter: I) -> Self {
        let mut agg = Aggregator::new();
        agg.extend(iter);
        agg
    }
}

/// Aggregate every category's results, visiting categories in pipeline order.
pub fn aggregate(result_sets: &BTreeMap<Category, Vec<EmissionResult>>) -> Vec<EntityAggregate> {
    result_sets
        .values()
        .flat_map(|results| results.iter().cloned())
        .collect::<Aggregator>()
        .finish()
}
