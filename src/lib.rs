//! `tabular-session` ingests tabular uploads (CSV and spreadsheets) into an in-memory
//! [`types::DataSet`] and keeps them in client-scoped sessions that expire when idle.
//!
//! The two halves:
//!
//! - [`ingestion`]: upload checks, encoding resolution for delimited text, one-pass or chunked
//!   reading, row sampling, and structural validation
//! - [`session`]: a concurrency-safe [`session::SessionStore`] that authorises every access
//!   against the owning client, plus a background sweeper for idle sessions
//!
//! [`upload::upload`] ties them together.
//!
//! ## What you can ingest
//!
//! - **Delimited text**: `.csv`, in UTF-8, Latin-1/ISO-8859-1, Windows-1252 or UTF-16 (detected),
//!   or any WHATWG encoding named explicitly
//! - **Spreadsheets** (requires the Cargo feature `excel`, on by default): `.xlsx`, `.xls`,
//!   `.xlsm`, `.xlsb`, `.ods`; the first sheet is read
//!
//! Column types are inferred from the cells:
//!
//! - [`types::DataType::Int64`]
//! - [`types::DataType::Float64`]
//! - [`types::DataType::Bool`]
//! - [`types::DataType::Utf8`]
//!
//! Empty cells and common NA markers (`NA`, `N/A`, `NULL`, `NaN`, ...) map to
//! [`types::Value::Null`].
//!
//! ## Quick example
//!
//! ```rust
//! use tabular_session::config::SessionConfig;
//! use tabular_session::session::SessionStore;
//! use tabular_session::upload::{upload, UploadOptions};
//!
//! let store = SessionStore::new(SessionConfig::default());
//! let csv = b"city,population\nLyon,522000\nNantes,320000\n";
//! let out = upload(&store, "203.0.113.7", "cities.csv", csv, None, &UploadOptions::default()).unwrap();
//! assert_eq!(out.row_count, 2);
//! assert!(!out.parse.is_chunked);
//!
//! // Only the uploading client can see the session.
//! assert!(store.get(&out.session_id, "203.0.113.7").is_ok());
//! assert!(store.get(&out.session_id, "198.51.100.2").is_err());
//! ```
//!
//! ## Chunked reading
//!
//! When the estimated row count of a CSV exceeds
//! [`ingestion::IngestionOptions::chunk_size`], the file is read in chunks of that many rows,
//! up to [`ingestion::IngestionOptions::max_chunks`] chunks. Rows beyond that ceiling are
//! dropped: the result then has [`ingestion::ParseMetadata::truncated`] set and a warning is
//! logged. Raise the limits if silent loss matters more than peak memory.
//!
//! ## Modules
//!
//! - [`ingestion`]: ingestion pipeline and its building blocks
//! - [`session`]: session store, records, clocks and the sweeper
//! - [`summary`]: per-column memory and type summaries
//! - [`upload`]: validate, ingest and store in one call
//! - [`config`]: configuration structs, loadable from TOML
//! - [`types`]: schema and in-memory dataset types
//! - [`error`]: error types
//! - [`telemetry`]: `tracing` subscriber setup for binaries

pub mod config;
pub mod error;
pub mod ingestion;
pub mod session;
pub mod summary;
pub mod telemetry;
pub mod types;
pub mod upload;

pub use error::{ConfigError, IngestionError, IngestionResult, SessionError, SessionResult, UploadError};
