// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use emissions_pipeline::config::PipelineConfig;
use emissions_pipeline::estimate::HttpEstimationClient;
use emissions_pipeline::logging;
use emissions_pipeline::output::OutputStore;
use emissions_pipeline::pipeline::{aggregate_stored, report_stored, Pipeline};
use emissions_pipeline::types::Category;

/// Estimate, aggregate and rank greenhouse-gas emissions per entity.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration document (JSON).
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Estimate every configured category, then aggregate and report.
    Run,
    /// Load and estimate a single category.
    Estimate { category: Category },
    /// Combine persisted category results per entity.
    Aggregate,
    /// Rank the persisted aggregate and write the report documents.
    Report {
        /// Number of ranked entities to keep.
        #[arg(long)]
        top: Option<usize>,
        /// Rank highest emitters first.
        #[arg(long)]
        descending: bool,
    },
}

fn http_client(config: &PipelineConfig) -> Result<HttpEstimationClient> {
    HttpEstimationClient::new(&config.api).context("failed to set up the estimation client")
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let config = PipelineConfig::from_path(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Commands::Run => {
            let client = http_client(&config)?;
            let summary = Pipeline::new(&config, &client)?.run()?;
            println!("{summary}");
        }
        Commands::Estimate { category } => {
            let client = http_client(&config)?;
            let report = Pipeline::new(&config, &client)?
                .estimate_category(category)
                .with_context(|| format!("estimation of {category} failed"))?;
            println!("{report}");
        }
        Commands::Aggregate => {
            let store = OutputStore::from_config(&config);
            let aggregates = aggregate_stored(&store)?;
            println!("{} entities aggregated", aggregates.len());
        }
        Commands::Report { top, descending } => {
            let mut ranking = config.ranking.clone();
            if let Some(n) = top {
                ranking.top_n = n;
            }
            if descending {
                ranking.ascending = false;
            }
            let store = OutputStore::from_config(&config);
            let output = report_stored(&store, &ranking).context("report generation failed")?;
            println!(
                "{} entities, {} kg CO2e total ({})",
                output.summary.total_entities,
                output.summary.total_emissions_kg_co2e,
                output.top_path.display()
            );
        }
    }

    Ok(())
}
