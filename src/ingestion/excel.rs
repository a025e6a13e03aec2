#![cfg(feature = "excel")]

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use super::infer::{normalize_cell, TableBuilder};
use crate::types::DataSet;

/// Read the first sheet of an in-memory workbook (`.xlsx`, `.xls`, `.ods`, etc.) as one unit.
///
/// Behavior:
/// - Detects the first non-empty row as the header row
/// - Blank header cells become `Unnamed: {idx}`, so structural validation can reject them
/// - Reads up to `max_rows` remaining rows (all when `None`) and infers column types
pub(crate) fn read_spreadsheet(bytes: &[u8], max_rows: Option<usize>) -> Result<DataSet, String> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| e.to_string())?;

    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "workbook has no sheets".to_string())?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| format!("sheet '{first}': {e}"))?;

    let mut rows = range.rows().skip_while(|row| row.iter().all(|c| matches!(c, Data::Empty)));
    let Some(header_row) = rows.next() else {
        return Ok(DataSet::default());
    };
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(idx, c)| match cell_to_header_string(c).trim() {
            "" => format!("Unnamed: {idx}"),
            name => name.to_owned(),
        })
        .collect();
    let width = headers.len();

    let raw = rows
        .take(max_rows.unwrap_or(usize::MAX))
        .map(|row| {
            (0..width)
                .map(|idx| row.get(idx).and_then(cell_to_raw))
                .collect()
        })
        .collect();

    let mut builder = TableBuilder::new(headers);
    builder.push(raw);
    Ok(builder.finish())
}

fn cell_to_header_string(c: &Data) -> String {
    cell_to_raw(c).unwrap_or_default()
}

fn cell_to_raw(c: &Data) -> Option<String> {
    match c {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => normalize_cell(s),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Some((*f as i64).to_string())
            } else {
                Some(f.to_string())
            }
        }
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}
