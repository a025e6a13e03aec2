//! End-to-end ingestion: raw upload bytes in, validated [`DataSet`] plus [`ParseMetadata`] out.
//!
//! For delimited text the pipeline:
//!
//! - resolves an encoding (explicit label, or detection plus a fixed fallback list)
//! - picks a read plan: the first `sample_rows` rows, one pass when the estimated row count fits
//!   in `chunk_size`, otherwise sequential chunks capped at `max_chunks`
//! - tries each encoding in order until the reader accepts the decoded text, ending with a lossy
//!   UTF-8 attempt unless that is disabled
//!
//! Spreadsheets are always read as one unit. Every successful parse is then checked by
//! [`validate_structure`].
//!
//! The chunk cap bounds memory, not correctness: input beyond `chunk_size * max_chunks` rows is
//! dropped. Such results carry [`ParseMetadata::truncated`] and are logged as `ingest_truncated`.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::config::{IngestionSettings, StructuralLimits};
use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataSet, FileKind};

use super::delimited::{estimate_rows, read_delimited, ReadPlan};
use super::encoding::{self, TextEncoding};
use super::observability::{
    severity_for_error, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
};
use super::validation::{file_kind_for, validate_structure};

/// Options controlling ingestion behavior.
///
/// Use [`Default`] for common cases, or [`IngestionOptions::from_settings`] to start from a loaded
/// configuration.
#[derive(Clone)]
pub struct IngestionOptions {
    /// Rows per chunk, and the estimated row count above which chunking kicks in.
    pub chunk_size: usize,
    /// Maximum number of chunks read from one input.
    pub max_chunks: usize,
    /// If set, only the first N data rows are read and chunking is skipped.
    pub sample_rows: Option<usize>,
    /// Detected encodings are tried first only above this confidence.
    pub high_confidence_threshold: f32,
    /// Whether to make a final lossy UTF-8 attempt after every candidate failed.
    pub allow_lossy_fallback: bool,
    /// Bounds applied after parsing.
    pub limits: StructuralLimits,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl IngestionOptions {
    pub fn from_settings(settings: &IngestionSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            max_chunks: settings.max_chunks,
            sample_rows: None,
            high_confidence_threshold: settings.high_confidence_threshold,
            allow_lossy_fallback: settings.allow_lossy_fallback,
            limits: settings.limits,
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

impl IngestionOptions {
    /// Reject settings under which no table could be read. Checked by [`parse_bytes`], so every
    /// entry point sees the same errors whether options came from a config file or were built
    /// by hand.
    pub fn validate(&self) -> IngestionResult<()> {
        let invalid = |message: &str| {
            Err(IngestionError::InvalidOptions {
                message: message.to_string(),
            })
        };
        if self.chunk_size == 0 {
            return invalid("chunk_size must be > 0");
        }
        if self.max_chunks == 0 {
            return invalid("max_chunks must be > 0");
        }
        if self.sample_rows == Some(0) {
            return invalid("sample_rows must be > 0 when set");
        }
        if !(0.0..=1.0).contains(&self.high_confidence_threshold) {
            return invalid("high_confidence_threshold must be within [0, 1]");
        }
        Ok(())
    }
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("chunk_size", &self.chunk_size)
            .field("max_chunks", &self.max_chunks)
            .field("sample_rows", &self.sample_rows)
            .field("high_confidence_threshold", &self.high_confidence_threshold)
            .field("allow_lossy_fallback", &self.allow_lossy_fallback)
            .field("limits", &self.limits)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self::from_settings(&IngestionSettings::default())
    }
}

/// How a table was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseMetadata {
    /// Encoding that decoded the text the reader accepted; `None` for spreadsheets.
    pub encoding_used: Option<String>,
    /// Encoding guessed by detection; `None` when the caller named one or for spreadsheets.
    pub detected_encoding: Option<String>,
    /// Confidence of the resolved encoding (`1.0` when explicit).
    pub encoding_confidence: Option<f32>,
    /// Encodings tried, in order, including the one that succeeded.
    pub attempted_encodings: Vec<String>,
    pub total_rows: usize,
    /// Cheap row-count estimate that drove the chunking decision.
    pub estimated_rows: Option<usize>,
    pub is_sampled: bool,
    pub sample_size: Option<usize>,
    pub is_chunked: bool,
    pub chunk_size: Option<usize>,
    pub chunks_read: usize,
    /// Rows beyond the chunk cap were dropped.
    pub truncated: bool,
    /// The text was decoded as UTF-8 with invalid sequences replaced.
    pub lossy: bool,
}

impl ParseMetadata {
    fn spreadsheet(total_rows: usize, sample_rows: Option<usize>) -> Self {
        Self {
            encoding_used: None,
            detected_encoding: None,
            encoding_confidence: None,
            attempted_encodings: Vec::new(),
            total_rows,
            estimated_rows: None,
            is_sampled: sample_rows.is_some(),
            sample_size: sample_rows,
            is_chunked: false,
            chunk_size: None,
            chunks_read: 1,
            truncated: false,
            lossy: false,
        }
    }
}

/// Result of a successful [`ingest`].
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub table: DataSet,
    pub file_kind: FileKind,
    pub metadata: ParseMetadata,
}

/// Ingest an upload: pick the file kind from `filename`, parse, and validate structure.
///
/// `encoding` names an explicit text encoding (e.g. `"latin-1"`); when given there is no fallback
/// and a failure to parse under it is returned as [`IngestionError::ParseFailed`].
///
/// When an observer is configured, this function reports:
///
/// - `on_success` on success, with row/column/chunking stats
/// - `on_failure` on failure, with a computed severity
/// - `on_alert` on failure when the computed severity is >= `options.alert_at_or_above`
///
/// ```no_run
/// use tabular_session::ingestion::{ingest, IngestionOptions};
///
/// # fn main() -> Result<(), tabular_session::IngestionError> {
/// let bytes = std::fs::read("people.csv").unwrap_or_default();
/// let out = ingest("people.csv", &bytes, None, &IngestionOptions::default())?;
/// println!("rows={} chunked={}", out.table.row_count(), out.metadata.is_chunked);
/// # Ok(())
/// # }
/// ```
pub fn ingest(
    filename: &str,
    bytes: &[u8],
    encoding: Option<&str>,
    options: &IngestionOptions,
) -> IngestionResult<Ingested> {
    let file_kind = file_kind_for(filename)?;
    let ctx = IngestionContext {
        filename: filename.to_string(),
        file_kind,
        size_bytes: bytes.len(),
    };

    let started = Instant::now();
    let result = parse_bytes(bytes, file_kind, encoding, options).and_then(|(table, metadata)| {
        validate_structure(&table, &options.limits)?;
        Ok(Ingested {
            table,
            file_kind,
            metadata,
        })
    });

    match &result {
        Ok(out) => {
            if out.metadata.truncated {
                tracing::warn!(
                    filename,
                    rows = out.metadata.total_rows,
                    chunk_size = ?out.metadata.chunk_size,
                    chunks_read = out.metadata.chunks_read,
                    "ingest_truncated: rows beyond the chunk cap were dropped"
                );
            }
            tracing::debug!(
                filename,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "ingest finished"
            );
        }
        Err(e) => tracing::debug!(filename, error = %e, "ingest rejected"),
    }

    if let Some(obs) = options.observer.as_ref() {
        match &result {
            Ok(out) => obs.on_success(
                &ctx,
                IngestionStats {
                    rows: out.table.row_count(),
                    columns: out.table.column_count(),
                    chunked: out.metadata.is_chunked,
                    truncated: out.metadata.truncated,
                },
            ),
            Err(e) => {
                let sev = severity_for_error(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }

    result
}

/// Parse `bytes` as `kind` without structural validation.
pub fn parse_bytes(
    bytes: &[u8],
    kind: FileKind,
    encoding: Option<&str>,
    options: &IngestionOptions,
) -> IngestionResult<(DataSet, ParseMetadata)> {
    options.validate()?;
    match kind {
        FileKind::Delimited => parse_delimited(bytes, encoding, options),
        FileKind::Spreadsheet => parse_spreadsheet(bytes, options.sample_rows),
    }
}

fn parse_delimited(
    bytes: &[u8],
    explicit: Option<&str>,
    options: &IngestionOptions,
) -> IngestionResult<(DataSet, ParseMetadata)> {
    let resolution = encoding::resolve(bytes, explicit)?;
    let order = encoding::attempt_order(&resolution, options.high_confidence_threshold);

    let (plan, estimated_rows) = match options.sample_rows {
        Some(n) => (ReadPlan::Sample(n), None),
        None => {
            let estimate = estimate_rows(bytes, resolution.encoding);
            let plan = if estimate <= options.chunk_size {
                ReadPlan::SinglePass
            } else {
                ReadPlan::Chunked {
                    chunk_size: options.chunk_size,
                    max_chunks: options.max_chunks,
                }
            };
            (plan, Some(estimate))
        }
    };
    tracing::debug!(
        encoding = %resolution.encoding,
        confidence = resolution.confidence,
        explicit = resolution.explicit,
        ?plan,
        ?estimated_rows,
        "resolved delimited read"
    );

    let mut attempted = Vec::with_capacity(order.len() + 1);
    let mut decoded_any = false;
    let mut last_error = String::new();

    let metadata = |used: TextEncoding, attempted: &[String], chunks_read, truncated, total_rows, lossy| {
        ParseMetadata {
            encoding_used: Some(used.name().to_string()),
            detected_encoding: (!resolution.explicit).then(|| resolution.encoding.name().to_string()),
            encoding_confidence: Some(resolution.confidence),
            attempted_encodings: attempted.to_vec(),
            total_rows,
            estimated_rows,
            is_sampled: matches!(plan, ReadPlan::Sample(_)),
            sample_size: match plan {
                ReadPlan::Sample(n) => Some(n),
                _ => None,
            },
            is_chunked: matches!(plan, ReadPlan::Chunked { .. }),
            chunk_size: match plan {
                ReadPlan::Chunked { chunk_size, .. } => Some(chunk_size),
                _ => None,
            },
            chunks_read,
            truncated,
            lossy,
        }
    };

    for candidate in order {
        attempted.push(candidate.name().to_string());
        let Some(text) = candidate.decode_strict(bytes) else {
            last_error = format!("input is not valid {candidate}");
            tracing::trace!(encoding = %candidate, "decode failed");
            continue;
        };
        decoded_any = true;
        match read_delimited(&text, plan) {
            Ok(out) => {
                let meta = metadata(
                    candidate,
                    &attempted,
                    out.chunks_read,
                    out.truncated,
                    out.table.row_count(),
                    false,
                );
                return Ok((out.table, meta));
            }
            Err(e) => {
                tracing::trace!(encoding = %candidate, error = %e, "read failed");
                last_error = e.to_string();
            }
        }
    }

    let parse_failed = |attempted: Vec<String>, message: String| IngestionError::ParseFailed {
        file_kind: FileKind::Delimited,
        attempted,
        detected_confidence: (!resolution.explicit).then_some(resolution.confidence),
        message,
    };

    if resolution.explicit {
        return Err(parse_failed(attempted, last_error));
    }

    if !options.allow_lossy_fallback {
        if decoded_any {
            return Err(parse_failed(attempted, last_error));
        }
        return Err(IngestionError::EncodingResolutionExhausted {
            attempted,
            detected: Some(resolution.encoding.name().to_string()),
            confidence: resolution.confidence,
        });
    }

    attempted.push(format!("{} (lossy)", TextEncoding::Utf8.name()));
    let text = TextEncoding::Utf8.decode_lossy(bytes);
    match read_delimited(&text, plan) {
        Ok(out) => {
            tracing::warn!(
                attempted = ?attempted,
                "no candidate encoding produced readable text; decoded as lossy utf-8"
            );
            let meta = metadata(
                TextEncoding::Utf8,
                &attempted,
                out.chunks_read,
                out.truncated,
                out.table.row_count(),
                true,
            );
            Ok((out.table, meta))
        }
        Err(e) => Err(parse_failed(attempted, e.to_string())),
    }
}

fn parse_spreadsheet(bytes: &[u8], sample_rows: Option<usize>) -> IngestionResult<(DataSet, ParseMetadata)> {
    #[cfg(feature = "excel")]
    {
        let table = super::excel::read_spreadsheet(bytes, sample_rows).map_err(|message| {
            IngestionError::ParseFailed {
                file_kind: FileKind::Spreadsheet,
                attempted: Vec::new(),
                detected_confidence: None,
                message,
            }
        })?;
        let meta = ParseMetadata::spreadsheet(table.row_count(), sample_rows);
        Ok((table, meta))
    }

    #[cfg(not(feature = "excel"))]
    {
        let _ = (bytes, sample_rows);
        Err(IngestionError::SpreadsheetSupportDisabled)
    }
}
