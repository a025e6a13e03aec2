//! Delimited-text (CSV) reading over already decoded text.
//!
//! The reader supports three plans:
//!
//! - [`ReadPlan::Sample`]: read only the first N data rows
//! - [`ReadPlan::SinglePass`]: read everything in one go
//! - [`ReadPlan::Chunked`]: read `chunk_size` rows at a time and concatenate, stopping after
//!   `max_chunks` chunks
//!
//! The chunk ceiling is a memory-safety bound, not a correctness guarantee: rows past
//! `chunk_size * max_chunks` are dropped, and the outcome reports `truncated = true`.

use thiserror::Error;

use super::encoding::TextEncoding;
use super::infer::{normalize_cell, RawRows, TableBuilder};
use crate::types::DataSet;

/// Bytes sampled from the start of the input to estimate its row count.
const ESTIMATE_SAMPLE_BYTES: usize = 1024;

/// Why the delimited reader rejected its input.
#[derive(Debug, Error)]
pub(crate) enum ReadFailure {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: expected {expected} fields, saw {found}")]
    RowTooWide {
        line: u64,
        expected: usize,
        found: usize,
    },
}

/// How much of the input to read, and in which shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadPlan {
    Sample(usize),
    SinglePass,
    Chunked { chunk_size: usize, max_chunks: usize },
}

#[derive(Debug)]
pub(crate) struct DelimitedOutcome {
    pub table: DataSet,
    pub chunks_read: usize,
    pub truncated: bool,
}

/// Estimate the number of lines in `bytes` from the newline density of a short prefix.
///
/// Approximate; an exact count would need a full pre-scan of the input.
/// Returns 0 when the prefix holds no newline.
pub fn estimate_rows(bytes: &[u8], encoding: TextEncoding) -> usize {
    let sample_len = bytes.len().min(ESTIMATE_SAMPLE_BYTES);
    if sample_len == 0 {
        return 0;
    }
    let lines = encoding
        .decode_lossy(&bytes[..sample_len])
        .matches('\n')
        .count();
    if lines == 0 {
        return 0;
    }
    (bytes.len() as f64 / sample_len as f64 * lines as f64) as usize
}

/// Read `text` according to `plan`.
pub(crate) fn read_delimited(text: &str, plan: ReadPlan) -> Result<DelimitedOutcome, ReadFailure> {
    let mut reader = RecordReader::new(text)?;
    let mut builder = TableBuilder::new(reader.headers.clone());

    match plan {
        ReadPlan::Sample(n) => {
            builder.push(reader.read_raw(n)?);
            Ok(DelimitedOutcome {
                table: builder.finish(),
                chunks_read: 1,
                truncated: false,
            })
        }
        ReadPlan::SinglePass => {
            builder.push(reader.read_raw(usize::MAX)?);
            Ok(DelimitedOutcome {
                table: builder.finish(),
                chunks_read: 1,
                truncated: false,
            })
        }
        ReadPlan::Chunked {
            chunk_size,
            max_chunks,
        } => {
            let mut chunks_read = 0;
            let mut exhausted = false;
            while chunks_read < max_chunks {
                let raw = reader.read_raw(chunk_size)?;
                if raw.is_empty() {
                    exhausted = true;
                    break;
                }
                let short = raw.len() < chunk_size;
                builder.push(raw);
                chunks_read += 1;
                tracing::trace!(chunk = chunks_read, rows = builder.row_count(), "read chunk");
                if short {
                    exhausted = true;
                    break;
                }
            }
            let truncated = !exhausted && reader.has_more()?;
            Ok(DelimitedOutcome {
                table: builder.finish(),
                chunks_read,
                truncated,
            })
        }
    }
}

struct RecordReader<'a> {
    rdr: csv::Reader<&'a [u8]>,
    headers: Vec<String>,
    record: csv::StringRecord,
}

impl<'a> RecordReader<'a> {
    fn new(text: &'a str) -> Result<Self, ReadFailure> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers = header_names(rdr.headers()?);
        Ok(Self {
            rdr,
            headers,
            record: csv::StringRecord::new(),
        })
    }

    /// Read up to `max_rows` data rows. Short rows are padded with missing cells; rows wider
    /// than the header are rejected.
    fn read_raw(&mut self, max_rows: usize) -> Result<RawRows, ReadFailure> {
        let width = self.headers.len();
        let mut rows = Vec::new();
        while rows.len() < max_rows && self.rdr.read_record(&mut self.record)? {
            if self.record.len() > width {
                return Err(ReadFailure::RowTooWide {
                    line: self.record.position().map(|p| p.line()).unwrap_or_default(),
                    expected: width,
                    found: self.record.len(),
                });
            }
            let mut row: Vec<Option<String>> = self.record.iter().map(normalize_cell).collect();
            row.resize(width, None);
            rows.push(row);
        }
        Ok(rows)
    }

    fn has_more(&mut self) -> Result<bool, ReadFailure> {
        Ok(self.rdr.read_record(&mut self.record)?)
    }
}

/// Header names with blanks replaced by `Unnamed: {idx}` and duplicates suffixed `.1`, `.2`, ...
fn header_names(record: &csv::StringRecord) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(record.len());
    for (idx, raw) in record.iter().enumerate() {
        let base = match raw.trim() {
            "" => format!("Unnamed: {idx}"),
            name => name.to_owned(),
        };
        let mut name = base.clone();
        let mut dup = 0;
        while names.contains(&name) {
            dup += 1;
            name = format!("{base}.{dup}");
        }
        names.push(name);
    }
    names
}
