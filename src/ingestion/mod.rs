//! Ingestion entrypoints and implementations.
//!
//! Most callers should use [`ingest`] (from [`pipeline`]) which:
//!
//! - picks the file kind from the filename extension
//! - resolves the text encoding of delimited uploads and reads them in one pass or in chunks
//! - validates the table's shape
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]
//!
//! Upload checks that run before parsing live in [`validation`]; [`preview`] reads the first few
//! rows only.

mod delimited;
pub mod encoding;
#[cfg(feature = "excel")]
mod excel;
mod infer;
pub mod observability;
pub mod pipeline;
pub mod preview;
pub mod validation;

pub use delimited::estimate_rows;
pub use encoding::{EncodingResolution, TextEncoding};
pub use observability::{
    severity_for_error, CompositeObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
    TracingObserver,
};
pub use pipeline::{ingest, parse_bytes, Ingested, IngestionOptions, ParseMetadata};
pub use preview::{preview, Preview};
pub use validation::{validate_structure, validate_upload};
