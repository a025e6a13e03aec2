//! Column type inference and chunk concatenation.
//!
//! Readers hand over raw cells (`None` for missing). Each chunk's column types are inferred on
//! arrival and unified into the running types, but cells stay as text until
//! [`TableBuilder::finish`] converts every row once against the final types. A chunked read
//! therefore yields exactly what a single pass over the same rows would.

use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Cell contents treated as missing, in addition to empty/blank cells.
const NA_TOKENS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "#N/A", "#NA", "<NA>",
];

/// Raw cells of a block of rows, row-major.
pub(crate) type RawRows = Vec<Vec<Option<String>>>;

/// Normalise a raw cell: trims whitespace and maps NA tokens to `None`.
pub(crate) fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NA_TOKENS.contains(&trimmed) {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// Infer one type per column of `raw`; `None` where a column held no value.
pub(crate) fn infer_types(width: usize, raw: &RawRows) -> Vec<Option<DataType>> {
    (0..width)
        .map(|col| infer_column(raw.iter().filter_map(|row| row.get(col).and_then(|c| c.as_deref()))))
        .collect()
}

fn infer_column<'a>(cells: impl Iterator<Item = &'a str>) -> Option<DataType> {
    let (mut int, mut float, mut boolean, mut seen) = (true, true, true, false);
    for cell in cells {
        seen = true;
        int = int && cell.parse::<i64>().is_ok();
        float = float && cell.parse::<f64>().is_ok();
        boolean = boolean && parse_bool(cell).is_some();
        if !(int || float || boolean) {
            return Some(DataType::Utf8);
        }
    }
    if !seen {
        None
    } else if int {
        Some(DataType::Int64)
    } else if float {
        Some(DataType::Float64)
    } else if boolean {
        Some(DataType::Bool)
    } else {
        Some(DataType::Utf8)
    }
}

fn convert(cell: String, ty: DataType) -> Value {
    match ty {
        DataType::Int64 => cell.parse().map(Value::Int64).unwrap_or(Value::Utf8(cell)),
        DataType::Float64 => cell.parse().map(Value::Float64).unwrap_or(Value::Utf8(cell)),
        DataType::Bool => parse_bool(&cell).map(Value::Bool).unwrap_or(Value::Utf8(cell)),
        DataType::Utf8 => Value::Utf8(cell),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Accumulates raw chunks into one [`DataSet`] in arrival order.
#[derive(Debug)]
pub(crate) struct TableBuilder {
    names: Vec<String>,
    types: Vec<Option<DataType>>,
    raw: RawRows,
}

impl TableBuilder {
    pub fn new(names: Vec<String>) -> Self {
        let types = vec![None; names.len()];
        Self {
            names,
            types,
            raw: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.raw.len()
    }

    /// Append a chunk, widening the running column types where the chunk disagrees.
    pub fn push(&mut self, mut chunk: RawRows) {
        let chunk_types = infer_types(self.names.len(), &chunk);
        for (current, chunk_ty) in self.types.iter_mut().zip(chunk_types) {
            *current = match (*current, chunk_ty) {
                (Some(a), Some(b)) => Some(a.unify(b)),
                (a, b) => a.or(b),
            };
        }
        self.raw.append(&mut chunk);
    }

    /// Convert every row against the final column types. Columns that never held a value are
    /// typed as strings.
    pub fn finish(self) -> DataSet {
        let types: Vec<DataType> = self
            .types
            .into_iter()
            .map(|ty| ty.unwrap_or(DataType::Utf8))
            .collect();
        let rows = self
            .raw
            .into_iter()
            .map(|row| {
                let mut cells = row.into_iter();
                types
                    .iter()
                    .map(|ty| match cells.next().flatten() {
                        Some(cell) => convert(cell, *ty),
                        None => Value::Null,
                    })
                    .collect()
            })
            .collect();
        let fields = self
            .names
            .into_iter()
            .zip(types)
            .map(|(name, ty)| Field::new(name, ty))
            .collect();
        DataSet::new(Schema::new(fields), rows)
    }
}
