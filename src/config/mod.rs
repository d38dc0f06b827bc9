//! Configuration model.
//!
//! The configuration document is JSON. It is read once per run into a [`PipelineConfig`] which is
//! then passed by reference to every component; nothing reads configuration from ambient state.
//!
//! ```json
//! {
//!   "data_sources": {
//!     "materials": {"enabled": true, "locations": ["raw/materials*.csv"],
//!                   "schema": {"entity_field": "Entity", "material_field": "Material"}}
//!   },
//!   "emission_factors": {"materials": {"Steel": "metals-type_steel"}},
//!   "api": {"data_version": "^21", "api_key": "..."},
//!   "allowed_materials": ["Steel"],
//!   "allowed_transport_modes": ["truck", "ship"],
//!   "intermodal_config": {"enabled": true, "default_leg_distribution": {"truck": 0.2, "ship": 0.8}},
//!   "output": {"emissions_dir": "emissions"}
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;
use crate::normalize::schema::SchemaConfig;
use crate::types::Category;

/// String-keyed map in document order. Sources load, and legs split, in the order declared.
pub type OrderedMap<V> = indexmap::IndexMap<String, V>;

/// Default estimation endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.climatiq.io/data/v1/estimate";

/// Environment variable consulted when the document carries no API key.
pub const API_KEY_ENV: &str = "CLIMATIQ_API_KEY";

/// Normalize free text for key lookups: trim, lower-case, internal whitespace runs become `_`.
///
/// Applied to both sides of every lookup (factor table keys, allow-lists, record values).
pub fn lookup_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Whole-run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Sources in declared order.
    pub data_sources: OrderedMap<DataSourceConfig>,
    #[serde(default)]
    pub emission_factors: EmissionFactorTable,
    pub api: ApiConfig,
    #[serde(default)]
    pub allowed_materials: AllowList,
    #[serde(default)]
    pub allowed_transport_modes: AllowList,
    #[serde(default)]
    pub intermodal_config: IntermodalConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Directory relative paths resolve against. Set from the config file location.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl PipelineConfig {
    /// Read and validate a configuration file. Relative paths resolve against its directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json_str(&text, base_dir)
    }

    /// Parse and validate a configuration document held in memory.
    pub fn from_json_str(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config: PipelineConfig = serde_json::from_str(text)?;
        config.base_dir = base_dir.into();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.data_version.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "api.data_version must not be empty".to_string(),
            });
        }
        if self.execution.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid {
                message: "execution.max_concurrent_requests must be > 0".to_string(),
            });
        }
        for (mode, proportion) in self.intermodal_config.default_leg_distribution.iter() {
            if !proportion.is_finite() || !(0.0..=1.0).contains(proportion) {
                return Err(ConfigError::Invalid {
                    message: format!("leg proportion for '{mode}' must be within [0, 1], got {proportion}"),
                });
            }
        }
        let total: f64 = self.intermodal_config.default_leg_distribution.values().sum();
        if self.intermodal_config.enabled && (total - 1.0).abs() > 1e-6 {
            warn!(total, "intermodal leg distribution does not sum to 1.0");
        }
        Ok(())
    }

    pub fn source(&self, name: &str) -> Option<&DataSourceConfig> {
        self.data_sources.get(name)
    }

    /// Resolve a configured path against [`Self::base_dir`]. Absolute paths are kept.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn emissions_dir(&self) -> PathBuf {
        self.resolve_path(&self.output.emissions_dir)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.resolve_path(&self.output.reports_dir)
    }
}

fn default_true() -> bool {
    true
}

/// One configured data source.
#[derive(Debug, Clone, Deserialize)]
pub struct DataSourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Glob patterns, relative to the base directory.
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub schema: SchemaConfig,
}

/// Per-category lookup table: normalized lookup key -> external activity id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmissionFactorTable {
    tables: HashMap<Category, HashMap<String, String>>,
}

impl EmissionFactorTable {
    pub fn insert(&mut self, category: Category, key: &str, activity_id: impl Into<String>) {
        self.tables
            .entry(category)
            .or_default()
            .insert(lookup_key(key), activity_id.into());
    }

    /// Activity id for `key` in `category`; `key` is normalized with [`lookup_key`].
    pub fn lookup(&self, category: Category, key: &str) -> Option<&str> {
        self.tables
            .get(&category)?
            .get(&lookup_key(key))
            .map(String::as_str)
    }

    pub fn len(&self, category: Category) -> usize {
        self.tables.get(&category).map_or(0, HashMap::len)
    }
}

impl<'de> Deserialize<'de> for EmissionFactorTable {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = OrderedMap::<OrderedMap<String>>::deserialize(deserializer)?;
        let mut table = EmissionFactorTable::default();
        for (name, entries) in raw.iter() {
            let Ok(category) = name.parse::<Category>() else {
                warn!(category = name.as_str(), "ignoring emission factors for unknown category");
                continue;
            };
            for (key, activity_id) in entries.iter() {
                table.insert(category, key, activity_id.clone());
            }
        }
        Ok(table)
    }
}

/// A list of permitted values. An empty list permits everything.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Vec<String>")]
pub struct AllowList {
    entries: Vec<String>,
}

impl From<Vec<String>> for AllowList {
    fn from(raw: Vec<String>) -> Self {
        Self {
            entries: raw.iter().map(|s| lookup_key(s)).collect(),
        }
    }
}

impl AllowList {
    pub fn permits(&self, value: &str) -> bool {
        self.entries.is_empty() || self.entries.contains(&lookup_key(value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

/// Estimation service settings.
#[derive(Clone, Deserialize)]
pub struct ApiConfig {
    pub data_version: String,
    #[serde(default, alias = "climatiq_api_key")]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("data_version", &self.data_version)
            .field("api_key_set", &!self.api_key.is_empty())
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ApiConfig {
    /// The configured key, or [`API_KEY_ENV`] when the document leaves it empty.
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_sentinel() -> String {
    "intermodal".to_string()
}

/// Multi-leg transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IntermodalConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `mode -> share of total distance`, in declared order.
    #[serde(default)]
    pub default_leg_distribution: OrderedMap<f64>,
    /// Mode value that marks a record as intermodal.
    #[serde(default = "default_sentinel")]
    pub sentinel_mode: String,
}

impl Default for IntermodalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_leg_distribution: OrderedMap::new(),
            sentinel_mode: default_sentinel(),
        }
    }
}

fn default_emissions_dir() -> PathBuf {
    PathBuf::from("emissions")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_emissions_dir")]
    pub emissions_dir: PathBuf,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            emissions_dir: default_emissions_dir(),
            reports_dir: default_reports_dir(),
        }
    }
}

fn default_ranking_categories() -> Vec<Category> {
    vec![Category::Materials, Category::Transport]
}

fn default_top_n() -> usize {
    5
}

/// Which category totals form the ranking metric, and in which direction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_ranking_categories")]
    pub categories: Vec<Category>,
    #[serde(default = "default_true")]
    pub ascending: bool,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            categories: default_ranking_categories(),
            ascending: true,
            top_n: default_top_n(),
        }
    }
}

fn default_max_concurrent_requests() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Records estimated concurrently. `1` keeps the run strictly sequential.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}
