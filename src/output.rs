//! Persisted artifacts.
//!
//! Per-category result files and the aggregate live in the emissions directory; report
//! documents live in the reports directory. All files are pretty-printed JSON.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::OutputError;
use crate::estimate::EmissionResult;
use crate::processing::EntityAggregate;
use crate::types::Category;

pub const AGGREGATED_FILE: &str = "aggregated_emissions.json";
pub const SUMMARY_FILE: &str = "summary_statistics.json";

/// `materials_emissions.json`, `transport_emissions.json`, ...
pub fn category_file_name(category: Category) -> String {
    format!("{category}_emissions.json")
}

#[derive(Debug, Clone)]
pub struct OutputStore {
    emissions_dir: PathBuf,
    reports_dir: PathBuf,
}

impl OutputStore {
    pub fn new(emissions_dir: impl Into<PathBuf>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            emissions_dir: emissions_dir.into(),
            reports_dir: reports_dir.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.emissions_dir(), config.reports_dir())
    }

    pub fn category_path(&self, category: Category) -> PathBuf {
        self.emissions_dir.join(category_file_name(category))
    }

    pub fn aggregate_path(&self) -> PathBuf {
        self.emissions_dir.join(AGGREGATED_FILE)
    }

    pub fn report_path(&self, name: &str) -> PathBuf {
        self.reports_dir.join(name)
    }

    pub fn write_category(&self, category: Category, results: &[EmissionResult]) -> Result<PathBuf, OutputError> {
        let path = self.category_path(category);
        write_json(&path, results)?;
        info!(%category, results = results.len(), path = %path.display(), "wrote category results");
        Ok(path)
    }

    /// Results of one category, or `None` when that category has not been estimated.
    pub fn read_category(&self, category: Category) -> Result<Option<Vec<EmissionResult>>, OutputError> {
        let path = self.category_path(category);
        if !path.exists() {
            warn!(%category, path = %path.display(), "no results file for category");
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    pub fn write_aggregate(&self, aggregates: &[EntityAggregate]) -> Result<PathBuf, OutputError> {
        let path = self.aggregate_path();
        write_json(&path, aggregates)?;
        info!(entities = aggregates.len(), path = %path.display(), "wrote aggregate");
        Ok(path)
    }

    /// The persisted aggregate. Missing is an error: nothing downstream can run without it.
    pub fn read_aggregate(&self) -> Result<Vec<EntityAggregate>, OutputError> {
        let path = self.aggregate_path();
        if !path.exists() {
            return Err(OutputError::MissingArtifact { path });
        }
        read_json(&path)
    }

    pub fn write_report<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf, OutputError> {
        let path = self.report_path(name);
        write_json(&path, value)?;
        info!(path = %path.display(), "wrote report");
        Ok(path)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let file = File::create(path).map_err(io_err(path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| OutputError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.write_all(b"\n").map_err(io_err(path))?;
    writer.flush().map_err(io_err(path))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, OutputError> {
    let file = File::open(path).map_err(io_err(path))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| OutputError::Json {
        path: path.to_path_buf(),
        source,
    })
}
