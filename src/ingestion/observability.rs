use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::LoadError;

use super::loader::SourceFormat;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (the file was dropped).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

impl LoadSeverity {
    /// Classify a per-file load failure.
    pub fn for_error(e: &LoadError) -> Self {
        match e {
            LoadError::Io(_) => LoadSeverity::Critical,
            LoadError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => LoadSeverity::Critical,
                _ => LoadSeverity::Error,
            },
            LoadError::UnsupportedFormat { .. } => LoadSeverity::Warning,
            _ => LoadSeverity::Error,
        }
    }
}

/// Context about one file load attempt.
#[derive(Debug, Clone)]
pub struct LoadContext {
    /// Configured source name.
    pub source: String,
    /// The matched file.
    pub path: PathBuf,
    /// Format chosen from the extension, if any.
    pub format: Option<SourceFormat>,
}

/// Minimal stats reported on a successful file load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Number of records read.
    pub records: usize,
}

/// Observer interface for per-file load outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait LoadObserver: Send + Sync {
    /// Called when a file loads.
    fn on_success(&self, _ctx: &LoadContext, _stats: LoadStats) {}

    /// Called when a file fails to load. The file is dropped; its source continues.
    fn on_failure(&self, _ctx: &LoadContext, _severity: LoadSeverity, _error: &LoadError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn LoadObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn LoadObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl LoadObserver for CompositeObserver {
    fn on_success(&self, ctx: &LoadContext, stats: LoadStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Logs load events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn on_success(&self, ctx: &LoadContext, stats: LoadStats) {
        info!(
            source = %ctx.source,
            format = ?ctx.format,
            path = %ctx.path.display(),
            records = stats.records,
            "loaded file"
        );
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        match severity {
            LoadSeverity::Info | LoadSeverity::Warning => warn!(
                source = %ctx.source,
                path = %ctx.path.display(),
                reason = %error,
                "skipping file"
            ),
            LoadSeverity::Error | LoadSeverity::Critical => error!(
                source = %ctx.source,
                ?severity,
                path = %ctx.path.display(),
                reason = %error,
                "failed to load file"
            ),
        }
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        error!(
            alert = true,
            source = %ctx.source,
            ?severity,
            path = %ctx.path.display(),
            reason = %error,
            "load alert"
        );
    }
}
