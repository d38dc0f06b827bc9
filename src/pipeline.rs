//! Stage sequencing: load, resolve, estimate and persist each category, then aggregate and report.
//!
//! Each stage reads what the previous one persisted, so `estimate`, `aggregate` and `report` can
//! also run on their own.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::config::{PipelineConfig, RankingConfig};
use crate::error::{LoadError, PipelineError};
use crate::estimate::{
    estimate_records, CategoryReport, EnergyEstimator, EstimationClient, MaterialsEstimator, TransportEstimator,
};
use crate::execution::ExecutionEngine;
use crate::ingestion::{LoadOptions, UniversalLoader};
use crate::normalize::ResolvedSchema;
use crate::output::{OutputStore, SUMMARY_FILE};
use crate::processing::{aggregate, summary_statistics, top_file_name, top_ranked, EntityAggregate, SummaryStatistics};
use crate::types::{Category, RecordSet};

/// Counts for a whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub categories: Vec<CategoryReport>,
    /// Sources that could not be estimated at all, with the reason.
    pub failed_sources: Vec<(String, String)>,
    pub entities: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.categories {
            writeln!(f, "{report}")?;
        }
        for (source, reason) in &self.failed_sources {
            writeln!(f, "{source}: not estimated ({reason})")?;
        }
        write!(f, "{} entities aggregated", self.entities)
    }
}

/// Paths and content of a report generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutput {
    pub top_path: PathBuf,
    pub summary_path: PathBuf,
    pub summary: SummaryStatistics,
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    client: &'a dyn EstimationClient,
    engine: ExecutionEngine,
    store: OutputStore,
    load_options: LoadOptions,
}

impl fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("engine", &self.engine)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, client: &'a dyn EstimationClient) -> Result<Self, PipelineError> {
        let engine = ExecutionEngine::from_config(&config.execution)?;
        Ok(Self {
            config,
            client,
            engine,
            store: OutputStore::from_config(config),
            load_options: LoadOptions::default(),
        })
    }

    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = options;
        self
    }

    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    fn loader(&self) -> UniversalLoader<'a> {
        UniversalLoader::new(self.config).with_options(self.load_options.clone())
    }

    /// Configured source name feeding `category`.
    fn source_name(&self, category: Category) -> Option<&'a str> {
        self.config
            .data_sources
            .keys()
            .map(String::as_str)
            .find(|name| name.parse::<Category>() == Ok(category))
    }

    /// Categories with a configured source, in declared source order.
    fn configured_categories(&self) -> Vec<(&'a str, Category)> {
        let mut out = Vec::new();
        for name in self.config.data_sources.keys().map(String::as_str) {
            match name.parse::<Category>() {
                Ok(category) => out.push((name, category)),
                Err(_) => warn!(source = name, "data source does not name a category; ignoring"),
            }
        }
        out
    }

    /// Load, resolve and estimate one category, then persist its results.
    pub fn estimate_category(&self, category: Category) -> Result<CategoryReport, PipelineError> {
        let name = self
            .source_name(category)
            .ok_or_else(|| LoadError::UnknownSource(category.to_string()))?;
        let records = self.loader().load(name)?;
        let report = self.estimate_loaded(name, category, &records)?;
        self.store.write_category(category, &report.results)?;
        Ok(report)
    }

    fn estimate_loaded(
        &self,
        name: &str,
        category: Category,
        records: &RecordSet,
    ) -> Result<CategoryReport, PipelineError> {
        if records.is_empty() {
            info!(%category, "no records to estimate");
            return Ok(CategoryReport::new(category));
        }
        let source = self
            .config
            .source(name)
            .ok_or_else(|| LoadError::UnknownSource(name.to_string()))?;
        let schema = ResolvedSchema::resolve(records, &source.schema, category)?;

        let report = match category {
            Category::Materials => {
                let estimator = MaterialsEstimator::new(self.config, self.client);
                estimate_records(&estimator, records, &schema, &self.engine)
            }
            Category::Transport => {
                let estimator = TransportEstimator::new(self.config, self.client);
                estimate_records(&estimator, records, &schema, &self.engine)
            }
            Category::Energy => {
                let estimator = EnergyEstimator::new(self.config, self.client);
                estimate_records(&estimator, records, &schema, &self.engine)
            }
        };
        Ok(report)
    }

    /// Fold every persisted category file into the aggregate and persist it.
    pub fn aggregate(&self) -> Result<Vec<EntityAggregate>, PipelineError> {
        aggregate_stored(&self.store)
    }

    /// Rank the persisted aggregate and write the top-N and summary documents.
    pub fn report(&self, ranking: &RankingConfig) -> Result<ReportOutput, PipelineError> {
        report_stored(&self.store, ranking)
    }

    /// Every stage end to end.
    ///
    /// A source whose required fields are missing is logged and left out; configuration, output
    /// and pattern errors abort the run. Every category file is rewritten, empty for categories
    /// that produced nothing, so aggregation never folds in results from an earlier run.
    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let loader = self.loader();
        let mut summary = RunSummary::default();
        let mut written = BTreeSet::new();

        for (name, category) in self.configured_categories() {
            let records = loader.load(name)?;
            written.insert(category);
            match self.estimate_loaded(name, category, &records) {
                Ok(report) => {
                    self.store.write_category(category, &report.results)?;
                    summary.categories.push(report);
                }
                Err(PipelineError::Schema(e)) => {
                    error!(source = name, %category, reason = %e, "source not estimated");
                    summary.failed_sources.push((name.to_string(), e.to_string()));
                    self.store.write_category(category, &[])?;
                }
                Err(e) => return Err(e),
            }
        }
        for category in Category::ALL.into_iter().filter(|c| !written.contains(c)) {
            info!(%category, "no source configured; clearing category results");
            self.store.write_category(category, &[])?;
        }

        summary.entities = self.aggregate()?.len();
        self.report(&self.config.ranking)?;

        info!(summary = %summary, "run complete");
        Ok(summary)
    }
}

/// Aggregation stage over whatever category files `store` holds. Needs no estimation client.
pub fn aggregate_stored(store: &OutputStore) -> Result<Vec<EntityAggregate>, PipelineError> {
    let mut sets = BTreeMap::new();
    for category in Category::ALL {
        if let Some(results) = store.read_category(category)? {
            sets.insert(category, results);
        }
    }
    let aggregates = aggregate(&sets);
    store.write_aggregate(&aggregates)?;
    Ok(aggregates)
}

/// Reporting stage over the aggregate persisted in `store`.
pub fn report_stored(store: &OutputStore, ranking: &RankingConfig) -> Result<ReportOutput, PipelineError> {
    let aggregates = store.read_aggregate()?;
    let top = top_ranked(&aggregates, ranking);
    let summary = summary_statistics(&aggregates, ranking);

    let top_path = store.write_report(&top_file_name(ranking.top_n, ranking.ascending), &top)?;
    let summary_path = store.write_report(SUMMARY_FILE, &summary)?;

    info!(
        entities = summary.total_entities,
        total_emissions_kg_co2e = summary.total_emissions_kg_co2e,
        "report generated"
    );
    Ok(ReportOutput {
        top_path,
        summary_path,
        summary,
    })
}
