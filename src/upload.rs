//! Upload flow: validate, ingest, and store the result in a new session.

use std::time::Instant;

use serde::Serialize;

use crate::config::{CoreConfig, UploadLimits};
use crate::error::{SessionError, UploadError};
use crate::ingestion::{ingest, validate_upload, IngestionOptions, ParseMetadata};
use crate::session::{SessionStore, SessionUpdate};
use crate::summary::{memory_estimate, type_summary, type_summary_json, MemoryEstimate};
use crate::types::FileKind;

/// Metadata keys written by [`upload`].
pub const META_MEMORY_ESTIMATE: &str = "memory_estimate";
pub const META_TYPE_SUMMARY: &str = "data_types_summary";
pub const META_PARSE: &str = "parse_metadata";

/// Options for [`upload`].
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub ingestion: IngestionOptions,
    pub limits: UploadLimits,
}

impl UploadOptions {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            ingestion: IngestionOptions::from_settings(&config.ingestion),
            limits: config.upload,
        }
    }
}

/// What a caller learns about a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadOutcome {
    pub session_id: String,
    pub filename: String,
    pub file_kind: FileKind,
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub parse: ParseMetadata,
    pub memory: MemoryEstimate,
    pub processing_time_ms: u64,
}

/// Validate and ingest an upload, then store it in a new session owned by `owner`.
///
/// The session is only created once ingestion has succeeded, so a rejected file never leaves an
/// empty session behind.
pub fn upload(
    store: &SessionStore,
    owner: &str,
    filename: &str,
    bytes: &[u8],
    encoding: Option<&str>,
    options: &UploadOptions,
) -> Result<UploadOutcome, UploadError> {
    let started = Instant::now();
    validate_upload(filename, bytes, &options.limits)?;
    let ingested = ingest(filename, bytes, encoding, &options.ingestion)?;

    let table = ingested.table;
    let memory = memory_estimate(&table);
    let types = type_summary(&table);
    let columns = table.column_names();
    let (row_count, column_count) = (table.row_count(), table.column_count());

    let session_id = store.create(owner, filename, ingested.file_kind)?;
    let update = SessionUpdate::new()
        .table(table)
        .metadata(META_MEMORY_ESTIMATE, memory.to_json())
        .metadata(META_TYPE_SUMMARY, type_summary_json(&types))
        .metadata(META_PARSE, serde_json::to_value(&ingested.metadata).unwrap_or_default());
    if !store.update(&session_id, owner, update) {
        // Only possible if the session was evicted between create and update.
        return Err(SessionError::NotFound.into());
    }

    let processing_time_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        session = session_id.get(..8).unwrap_or(&session_id),
        owner,
        filename,
        rows = row_count,
        columns = column_count,
        processing_time_ms,
        "upload stored"
    );

    Ok(UploadOutcome {
        session_id,
        filename: filename.to_string(),
        file_kind: ingested.file_kind,
        row_count,
        column_count,
        columns,
        parse: ingested.metadata,
        memory,
        processing_time_ms,
    })
}
