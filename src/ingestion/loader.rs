//! Source loading.
//!
//! [`UniversalLoader::load`] expands a configured source's location patterns against the
//! configuration's base directory, reads every matched file with the reader chosen by its
//! extension, tags each record with its file name and concatenates the files in match order.
//!
//! - A disabled source or a source whose patterns match nothing yields an empty set and a warning.
//! - A file that cannot be read is reported to the [`LoadObserver`] and dropped; the rest of the
//!   source still loads.
//! - An unknown source name or an invalid pattern is an error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{LoadError, LoadResult};
use crate::types::{RawRecord, RecordSet};

use super::observability::{LoadContext, LoadObserver, LoadSeverity, LoadStats, TracingObserver};
use super::{csv, json, xml};

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Comma-separated values.
    Csv,
    /// JSON array-of-objects, single object or NDJSON.
    Json,
    /// Spreadsheet/workbook formats (feature-gated behind `excel`).
    Excel,
    /// XML with one record per root child.
    Xml,
}

impl SourceFormat {
    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" | "ndjson" => Some(Self::Json),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }

    /// Infer the format of `path` from its extension.
    pub fn from_path(path: &Path) -> LoadResult<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: ext.to_string(),
        })
    }
}

/// How to choose sheet(s) when reading a workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExcelSheetSelection {
    /// Read the first sheet (default).
    #[default]
    First,
    /// Read a single named sheet.
    Sheet(String),
    /// Read all sheets and concatenate rows.
    AllSheets,
    /// Read only the listed sheets (in order) and concatenate rows.
    Sheets(Vec<String>),
}

/// Options controlling file loading.
#[derive(Clone)]
pub struct LoadOptions {
    /// Workbook sheet selection.
    pub excel_sheet_selection: ExcelSheetSelection,
    /// Receives per-file outcomes.
    pub observer: Arc<dyn LoadObserver>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: LoadSeverity,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("excel_sheet_selection", &self.excel_sheet_selection)
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish_non_exhaustive()
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            excel_sheet_selection: ExcelSheetSelection::default(),
            observer: Arc::new(TracingObserver),
            alert_at_or_above: LoadSeverity::Critical,
        }
    }
}

/// Name recorded in each record's `source_file`.
pub fn source_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Read one file, choosing the reader by extension.
pub fn read_file(path: impl AsRef<Path>, options: &LoadOptions) -> LoadResult<Vec<RawRecord>> {
    let path = path.as_ref();
    let format = SourceFormat::from_path(path)?;
    read_file_as(path, format, options)
}

fn read_file_as(path: &Path, format: SourceFormat, options: &LoadOptions) -> LoadResult<Vec<RawRecord>> {
    let source_file = source_file_name(path);
    match format {
        SourceFormat::Csv => csv::read_csv_from_path(path, &source_file),
        SourceFormat::Json => json::read_json_from_path(path, &source_file),
        SourceFormat::Xml => xml::read_xml_from_path(path, &source_file),
        SourceFormat::Excel => read_excel_dispatch(path, &options.excel_sheet_selection, &source_file),
    }
}

fn read_excel_dispatch(
    path: &Path,
    selection: &ExcelSheetSelection,
    source_file: &str,
) -> LoadResult<Vec<RawRecord>> {
    #[cfg(feature = "excel")]
    {
        super::excel::read_excel_from_path(path, selection, source_file)
    }

    #[cfg(not(feature = "excel"))]
    {
        let _ = (selection, source_file);
        Err(LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: "spreadsheet (enable cargo feature 'excel')".to_string(),
        })
    }
}

/// Loads configured data sources.
#[derive(Debug)]
pub struct UniversalLoader<'a> {
    config: &'a PipelineConfig,
    options: LoadOptions,
}

impl<'a> UniversalLoader<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Files matching `patterns` under the base directory, in match order.
    ///
    /// Each pattern's matches are sorted by path; a file matched by more than one pattern is kept
    /// once, at its first position.
    pub fn find_files(&self, patterns: &[String]) -> LoadResult<Vec<PathBuf>> {
        let base = glob::Pattern::escape(&self.config.base_dir.to_string_lossy());
        let mut files: Vec<PathBuf> = Vec::new();

        for pattern in patterns {
            let full = if Path::new(pattern).is_absolute() || base.is_empty() {
                pattern.clone()
            } else {
                format!("{}/{}", base.trim_end_matches('/'), pattern)
            };
            let paths = glob::glob(&full).map_err(|e| LoadError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;

            for entry in paths {
                match entry {
                    Ok(path) if path.is_file() => {
                        if !files.contains(&path) {
                            files.push(path);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!(%pattern, reason = %e, "unreadable path while matching"),
                }
            }
        }

        Ok(files)
    }

    /// Load every file of the named source into one record set.
    pub fn load(&self, name: &str) -> LoadResult<RecordSet> {
        let source = self
            .config
            .source(name)
            .ok_or_else(|| LoadError::UnknownSource(name.to_string()))?;

        if !source.enabled {
            warn!(source = name, "data source is disabled");
            return Ok(RecordSet::default());
        }

        let files = self.find_files(&source.locations)?;
        if files.is_empty() {
            warn!(source = name, locations = ?source.locations, "no files found for data source");
            return Ok(RecordSet::default());
        }

        let mut set = RecordSet::default();
        let mut loaded = 0usize;
        for path in &files {
            let format = SourceFormat::from_path(path);
            let ctx = LoadContext {
                source: name.to_string(),
                path: path.clone(),
                format: format.as_ref().ok().copied(),
            };

            let result = format.and_then(|format| read_file_as(path, format, &self.options));

            match result {
                Ok(records) => {
                    self.options
                        .observer
                        .on_success(&ctx, LoadStats { records: records.len() });
                    set.extend(records);
                    loaded += 1;
                }
                Err(e) => {
                    let severity = LoadSeverity::for_error(&e);
                    self.options.observer.on_failure(&ctx, severity, &e);
                    if severity >= self.options.alert_at_or_above {
                        self.options.observer.on_alert(&ctx, severity, &e);
                    }
                }
            }
        }

        info!(
            source = name,
            records = set.len(),
            files = loaded,
            failed = files.len() - loaded,
            "data source loaded"
        );
        Ok(set)
    }

    /// Load every configured source in declared order.
    pub fn load_all(&self) -> LoadResult<Vec<(String, RecordSet)>> {
        self.config
            .data_sources
            .keys()
            .map(|name| Ok((name.to_string(), self.load(name)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(SourceFormat::from_extension("CSV"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_extension("ndjson"), Some(SourceFormat::Json));
        assert_eq!(SourceFormat::from_extension("ods"), Some(SourceFormat::Excel));
        assert_eq!(SourceFormat::from_extension("xml"), Some(SourceFormat::Xml));
        assert_eq!(SourceFormat::from_extension("parquet"), None);
    }

    #[test]
    fn unsupported_extension_names_the_file() {
        let err = SourceFormat::from_path(Path::new("data/emissions.txt")).unwrap_err();
        assert!(matches!(
            err,
            LoadError::UnsupportedFormat { ref extension, .. } if extension == "txt"
        ));
    }

    #[test]
    fn source_file_is_the_file_name() {
        assert_eq!(source_file_name(Path::new("/a/b/materials_q1.csv")), "materials_q1.csv");
    }
}
