use serde::Serialize;

use crate::error::IngestionResult;
use crate::types::{FileKind, Value};

use super::pipeline::{parse_bytes, IngestionOptions};
use super::validation::file_kind_for;

/// Rows shown by [`preview`] when the caller does not ask for a number.
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// First rows of an upload, read without structural validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub file_kind: FileKind,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub encoding: Option<String>,
    pub encoding_confidence: Option<f32>,
}

/// Read the first `rows` rows (default [`DEFAULT_PREVIEW_ROWS`]) of an upload.
///
/// Uses the sampling path, so large inputs are never read in full.
pub fn preview(filename: &str, bytes: &[u8], rows: Option<usize>, encoding: Option<&str>) -> IngestionResult<Preview> {
    let file_kind = file_kind_for(filename)?;
    let options = IngestionOptions {
        sample_rows: Some(rows.unwrap_or(DEFAULT_PREVIEW_ROWS)),
        ..IngestionOptions::default()
    };
    let (table, metadata) = parse_bytes(bytes, file_kind, encoding, &options)?;
    Ok(Preview {
        file_kind,
        columns: table.column_names(),
        rows: table.rows,
        encoding: metadata.encoding_used,
        encoding_confidence: metadata.encoding_confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_reads_only_the_head() {
        let mut csv = String::from("n,sq\n");
        for i in 0..100 {
            csv.push_str(&format!("{i},{}\n", i * i));
        }
        let p = preview("nums.csv", csv.as_bytes(), None, None).unwrap();
        assert_eq!(p.columns, vec!["n", "sq"]);
        assert_eq!(p.rows.len(), DEFAULT_PREVIEW_ROWS);
        assert_eq!(p.rows[4][1], Value::Int64(16));
        assert_eq!(p.encoding.as_deref(), Some("utf-8"));
    }

    #[test]
    fn preview_does_not_reject_placeholder_headers() {
        let p = preview("x.csv", b"Unnamed: 0,b\n1,2\n", Some(1), None).unwrap();
        assert_eq!(p.columns[0], "Unnamed: 0");
    }
}
