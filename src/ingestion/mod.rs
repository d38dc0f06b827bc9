//! Ingestion entrypoints and implementations.
//!
//! Most callers should use [`UniversalLoader`] (from [`loader`]) which:
//!
//! - expands a source's location patterns and picks a reader per file extension
//! - tags every record with the file it came from
//! - reports per-file success/failure/alerts to a [`LoadObserver`]
//!
//! Format-specific readers are also available under:
//! - [`csv`]
//! - [`json`]
//! - [`xml`]
//! - `excel` (with the `excel` feature)

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod json;
pub mod loader;
pub mod observability;
pub mod xml;

pub use loader::{read_file, ExcelSheetSelection, LoadOptions, SourceFormat, UniversalLoader};
pub use observability::{CompositeObserver, LoadContext, LoadObserver, LoadSeverity, LoadStats, TracingObserver};
