use thiserror::Error;

use crate::config::StructuralLimits;
use crate::types::FileKind;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Convenience result type for session store operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Error type returned by upload validation and the ingestion pipeline.
///
/// Every failure is a single typed value carrying enough context (candidates tried, detected
/// confidence, measured counts) for the caller to build a precise user-facing message.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The upload carried no usable filename.
    #[error("no filename provided")]
    MissingFilename,

    /// The extension or content does not match a supported file kind.
    #[error("file type '{detected}' of '{filename}' is not supported; allowed: {}", .allowed.join(", "))]
    UnsupportedFileType {
        filename: String,
        detected: String,
        allowed: Vec<String>,
    },

    /// The upload exceeds the configured size limit.
    #[error("file size ({size_bytes} bytes) exceeds maximum allowed size ({max_bytes} bytes)")]
    FileTooLarge { size_bytes: usize, max_bytes: usize },

    /// An explicitly requested encoding label is not recognised.
    #[error("unknown encoding label '{label}'")]
    UnknownEncoding { label: String },

    /// No candidate encoding could decode the input and the lossy fallback is disabled.
    #[error(
        "could not decode input with any of [{}] (detected {detected:?} at confidence {confidence:.2})",
        .attempted.join(", ")
    )]
    EncodingResolutionExhausted {
        attempted: Vec<String>,
        detected: Option<String>,
        confidence: f32,
    },

    /// The parsed table violates row/column bounds or has placeholder headers.
    #[error(
        "structural validation failed: {reason} (rows={rows}, columns={columns}, allowed rows {}..={}, columns {}..={})",
        .limits.min_rows, .limits.max_rows, .limits.min_columns, .limits.max_columns
    )]
    StructuralValidationFailed {
        reason: String,
        rows: usize,
        columns: usize,
        limits: StructuralLimits,
    },

    /// The underlying reader rejected the input under every attempted encoding.
    #[error("failed to read {file_kind} input (tried [{}]): {message}", .attempted.join(", "))]
    ParseFailed {
        file_kind: FileKind,
        attempted: Vec<String>,
        detected_confidence: Option<f32>,
        message: String,
    },

    /// Ingestion options that cannot produce a table (e.g. a zero chunk size).
    #[error("invalid ingestion options: {message}")]
    InvalidOptions { message: String },

    /// Spreadsheet input arrived but the crate was built without the `excel` feature.
    #[error("spreadsheet ingestion not enabled (enable cargo feature 'excel')")]
    SpreadsheetSupportDisabled,
}

/// Error type returned by the session store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Session absent, expired, deleted or owned by someone else.
    ///
    /// Carries no detail, so callers cannot tell those cases apart.
    #[error("session not found or expired; please upload your file again")]
    NotFound,

    /// The live-session cap is reached and eviction is disabled.
    #[error("session store is full ({live} live sessions, max {max})")]
    StoreExhausted { live: usize, max: usize },
}

/// Error type for the upload glue, which spans ingestion and session creation.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {message}")]
    Invalid { message: String },
}
