use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{DataSet, FileKind};

/// Open-ended metadata attached to a session (memory estimate, type summary, parse details).
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A point-in-time copy of a stored session.
///
/// Returned by [`super::SessionStore::get`] and friends. The table is shared, not copied; a later
/// [`SessionUpdate`] swaps in a new table and leaves copies taken earlier untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    id: String,
    owner: String,
    filename: String,
    file_kind: FileKind,
    #[serde(skip)]
    table: Arc<DataSet>,
    row_count: usize,
    column_count: usize,
    created_at: DateTime<Utc>,
    last_access: DateTime<Utc>,
    metadata: Metadata,
}

impl SessionRecord {
    pub(crate) fn new(id: String, owner: String, filename: String, file_kind: FileKind, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner,
            filename,
            file_kind,
            table: Arc::new(DataSet::default()),
            row_count: 0,
            column_count: 0,
            created_at: now,
            last_access: now,
            metadata: Metadata::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Client identity that created the session. Never changes.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn file_kind(&self) -> FileKind {
        self.file_kind
    }

    pub fn table(&self) -> &Arc<DataSet> {
        &self.table
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        self.last_access
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Moves `last_access` forward; never backwards.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_access {
            self.last_access = now;
        }
    }

    pub(crate) fn idle_longer_than(&self, now: DateTime<Utc>, expiry: std::time::Duration) -> bool {
        (now - self.last_access)
            .to_std()
            .map(|idle| idle > expiry)
            .unwrap_or(false)
    }

    pub(crate) fn apply(&mut self, update: SessionUpdate) {
        let SessionUpdate {
            filename,
            table,
            metadata,
        } = update;
        if let Some(filename) = filename {
            self.filename = filename;
        }
        if let Some(table) = table {
            self.row_count = table.row_count();
            self.column_count = table.column_count();
            self.table = Arc::new(table);
        }
        self.metadata.extend(metadata);
    }
}

/// Fields to merge into a session. The owner is not among them.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub filename: Option<String>,
    /// Replaces the whole table; row and column counts follow it.
    pub table: Option<DataSet>,
    /// Merged key by key over the existing metadata.
    pub metadata: Metadata,
}

impl SessionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: DataSet) -> Self {
        self.table = Some(table);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
