use std::fmt;
use std::sync::Arc;

use crate::error::IngestionError;
use crate::types::FileKind;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal, e.g. rows dropped at the chunk cap).
    Warning,
    /// Error-level event (the caller can fix the input and retry).
    Error,
    /// Critical error (the input could not be read at all).
    Critical,
}

/// Classify an ingestion failure.
///
/// Problems with the upload itself (name, type, size, shape) are [`IngestionSeverity::Error`];
/// inputs that no reader or encoding could make sense of are [`IngestionSeverity::Critical`].
pub fn severity_for_error(error: &IngestionError) -> IngestionSeverity {
    match error {
        IngestionError::MissingFilename
        | IngestionError::UnsupportedFileType { .. }
        | IngestionError::FileTooLarge { .. }
        | IngestionError::UnknownEncoding { .. }
        | IngestionError::StructuralValidationFailed { .. }
        | IngestionError::InvalidOptions { .. }
        | IngestionError::SpreadsheetSupportDisabled => IngestionSeverity::Error,
        IngestionError::EncodingResolutionExhausted { .. } | IngestionError::ParseFailed { .. } => {
            IngestionSeverity::Critical
        }
    }
}

/// Context about an ingestion attempt.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    /// Original filename of the upload.
    pub filename: String,
    /// Kind the upload was validated as.
    pub file_kind: FileKind,
    /// Size of the raw upload.
    pub size_bytes: usize,
}

/// Stats reported on successful ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    pub rows: usize,
    pub columns: usize,
    pub chunked: bool,
    pub truncated: bool,
}

/// Observer interface for ingestion outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called when ingestion succeeds.
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called when ingestion fails.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestionError) {}

    /// Called when an ingestion failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
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

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards ingestion events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        tracing::info!(
            filename = %ctx.filename,
            file_kind = %ctx.file_kind,
            size_bytes = ctx.size_bytes,
            rows = stats.rows,
            columns = stats.columns,
            chunked = stats.chunked,
            truncated = stats.truncated,
            "ingest_ok"
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        match severity {
            IngestionSeverity::Info => tracing::info!(filename = %ctx.filename, %error, "ingest_failed"),
            IngestionSeverity::Warning => tracing::warn!(filename = %ctx.filename, %error, "ingest_failed"),
            IngestionSeverity::Error | IngestionSeverity::Critical => {
                tracing::error!(filename = %ctx.filename, ?severity, %error, "ingest_failed")
            }
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::error!(
            filename = %ctx.filename,
            file_kind = %ctx.file_kind,
            ?severity,
            %error,
            alert = true,
            "ingest_alert"
        );
    }
}
