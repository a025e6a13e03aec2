//! Per-column metadata computed once a table is ingested: an in-memory footprint estimate and a
//! type summary. Columns are processed in parallel.

use std::collections::{BTreeMap, HashSet};
use std::mem::size_of;

use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;

use crate::types::{DataSet, Value};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Estimated in-memory size of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryEstimate {
    pub total_bytes: usize,
    pub total_mb: f64,
    pub per_column: BTreeMap<String, usize>,
}

impl MemoryEstimate {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "total_bytes": self.total_bytes,
            "total_mb": self.total_mb,
            "per_column": self.per_column,
        })
    }
}

/// Type and null statistics of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnTypeSummary {
    pub dtype: String,
    pub non_null_count: usize,
    pub null_count: usize,
    /// Distinct non-null values.
    pub unique_count: usize,
}

/// [`ColumnTypeSummary`] per column, keyed by column name.
pub type TypeSummary = BTreeMap<String, ColumnTypeSummary>;

/// Estimate how much memory `table` occupies: one [`Value`] slot per cell plus string payloads.
pub fn memory_estimate(table: &DataSet) -> MemoryEstimate {
    let per_column: BTreeMap<String, usize> = (0..table.column_count())
        .into_par_iter()
        .map(|idx| {
            let bytes: usize = table
                .column(idx)
                .map(|v| match v {
                    Value::Utf8(s) => size_of::<Value>() + s.capacity(),
                    _ => size_of::<Value>(),
                })
                .sum();
            (table.schema.fields[idx].name.clone(), bytes)
        })
        .collect();
    let total_bytes: usize = per_column.values().sum();
    MemoryEstimate {
        total_bytes,
        total_mb: round2(total_bytes as f64 / BYTES_PER_MB),
        per_column,
    }
}

/// Summarise type, null count and cardinality of every column.
pub fn type_summary(table: &DataSet) -> TypeSummary {
    (0..table.column_count())
        .into_par_iter()
        .map(|idx| {
            let field = &table.schema.fields[idx];
            let mut distinct = HashSet::new();
            let mut nulls = 0;
            for v in table.column(idx) {
                match unique_key(v) {
                    Some(key) => {
                        distinct.insert(key);
                    }
                    None => nulls += 1,
                }
            }
            let summary = ColumnTypeSummary {
                dtype: field.data_type.name().to_string(),
                non_null_count: table.row_count() - nulls,
                null_count: nulls,
                unique_count: distinct.len(),
            };
            (field.name.clone(), summary)
        })
        .collect()
}

/// Serialise a [`TypeSummary`] for the session metadata map.
pub fn type_summary_json(summary: &TypeSummary) -> serde_json::Value {
    let columns: serde_json::Map<String, serde_json::Value> = summary
        .iter()
        .map(|(name, s)| {
            (
                name.clone(),
                json!({
                    "dtype": s.dtype,
                    "non_null_count": s.non_null_count,
                    "null_count": s.null_count,
                    "unique_count": s.unique_count,
                }),
            )
        })
        .collect();
    serde_json::Value::Object(columns)
}

#[derive(Hash, PartialEq, Eq)]
enum UniqueKey<'a> {
    Int(i64),
    Float(u64),
    Bool(bool),
    Str(&'a str),
}

fn unique_key(v: &Value) -> Option<UniqueKey<'_>> {
    match v {
        Value::Null => None,
        Value::Int64(i) => Some(UniqueKey::Int(*i)),
        Value::Float64(f) => Some(UniqueKey::Float(f.to_bits())),
        Value::Bool(b) => Some(UniqueKey::Bool(*b)),
        Value::Utf8(s) => Some(UniqueKey::Str(s)),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
