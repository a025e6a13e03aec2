use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use parking_lot::{Mutex, RwLock};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::types::FileKind;

use super::clock::{Clock, SystemClock};
use super::record::{SessionRecord, SessionUpdate};

/// Random bytes behind every session id (256 bits).
const SESSION_ID_BYTES: usize = 32;

/// One stored session. `removed` is set under the slot lock before (delete) or right after
/// (sweep, eviction) the id leaves the map, so a reader holding a stale handle still sees the
/// removal.
#[derive(Debug)]
struct Slot {
    record: SessionRecord,
    removed: bool,
}

type SlotHandle = Arc<Mutex<Slot>>;

/// Outcome of one [`SessionStore::sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Sessions looked at.
    pub examined: usize,
    /// Sessions removed for being idle too long.
    pub expired: usize,
}

/// Process-wide session table with per-owner index.
///
/// Lock order is map, then slot, then owner index. Lookups hold the map lock only long enough to
/// clone a slot handle, so work on different sessions does not serialise.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SlotHandle>>,
    owners: Mutex<HashMap<String, Vec<String>>>,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            owners: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create an empty session owned by `owner` and return its id.
    ///
    /// When `max_sessions` is reached, either the least recently used session is evicted
    /// (`evict_oldest_when_full`) or [`SessionError::StoreExhausted`] is returned.
    pub fn create(&self, owner: &str, filename: &str, file_kind: FileKind) -> SessionResult<String> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();

        if let Some(max) = self.config.max_sessions {
            if sessions.len() >= max {
                if !self.config.evict_oldest_when_full {
                    tracing::warn!(live = sessions.len(), max, "session store exhausted");
                    return Err(SessionError::StoreExhausted {
                        live: sessions.len(),
                        max,
                    });
                }
                self.evict_oldest(&mut sessions);
            }
        }

        let id = loop {
            let candidate = new_session_id();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let record = SessionRecord::new(id.clone(), owner.to_string(), filename.to_string(), file_kind, now);
        sessions.insert(id.clone(), Arc::new(Mutex::new(Slot { record, removed: false })));
        self.owners.lock().entry(owner.to_string()).or_default().push(id.clone());

        tracing::info!(session = short(&id), owner, filename, %file_kind, "session_created");
        Ok(id)
    }

    /// Fetch a session for its owner and refresh its last access time.
    ///
    /// Absent, removed and foreign sessions all yield [`SessionError::NotFound`]; foreign access
    /// is additionally logged as `unauthorized_access`.
    pub fn get(&self, id: &str, requester: &str) -> SessionResult<SessionRecord> {
        self.with_authorized(id, requester, |record, now| {
            record.touch(now);
            record.clone()
        })
    }

    /// Merge `update` into a session owned by `requester`. Returns `false` when the session is
    /// absent or foreign.
    pub fn update(&self, id: &str, requester: &str, update: SessionUpdate) -> bool {
        self.with_authorized(id, requester, |record, now| {
            record.apply(update);
            record.touch(now);
        })
        .is_ok()
    }

    /// Remove a session owned by `requester`. Returns `false` when the session is absent or
    /// foreign.
    pub fn delete(&self, id: &str, requester: &str) -> bool {
        let Some(slot) = self.slot(id) else {
            return false;
        };
        {
            let mut slot = slot.lock();
            if slot.removed || !self.authorized(&slot.record, requester) {
                return false;
            }
            slot.removed = true;
        }
        self.sessions.write().remove(id);
        self.unindex(requester, &[id]);
        tracing::info!(session = short(id), owner = requester, "session_deleted");
        true
    }

    /// Live sessions owned by `owner`. Does not refresh access times.
    pub fn list_for(&self, owner: &str) -> Vec<SessionRecord> {
        let ids = self.owners.lock().get(owner).cloned().unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.slot(id))
            .filter_map(|slot| {
                let slot = slot.lock();
                (!slot.removed && slot.record.owner() == owner).then(|| slot.record.clone())
            })
            .collect()
    }

    /// Remove every session idle for longer than `expiry`.
    ///
    /// Safe to run alongside any other operation; a session touched before the sweep reaches it
    /// survives.
    pub fn sweep(&self, expiry: Duration) -> SweepReport {
        let now = self.clock.now();
        let handles: Vec<(String, SlotHandle)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();

        let mut expired: Vec<(String, String)> = Vec::new();
        for (id, handle) in &handles {
            let mut slot = handle.lock();
            if !slot.removed && slot.record.idle_longer_than(now, expiry) {
                slot.removed = true;
                expired.push((id.clone(), slot.record.owner().to_string()));
            }
        }

        if !expired.is_empty() {
            {
                let mut sessions = self.sessions.write();
                for (id, _) in &expired {
                    sessions.remove(id);
                }
            }
            let mut owners = self.owners.lock();
            for (id, owner) in &expired {
                remove_from_index(&mut owners, owner, id);
                tracing::info!(session = short(id), owner = owner.as_str(), "session_expired");
            }
        }

        SweepReport {
            examined: handles.len(),
            expired: expired.len(),
        }
    }

    /// Number of live sessions, for health checks.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is live, regardless of owner. Not for request paths.
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    fn slot(&self, id: &str) -> Option<SlotHandle> {
        self.sessions.read().get(id).cloned()
    }

    fn authorized(&self, record: &SessionRecord, requester: &str) -> bool {
        if record.owner() == requester {
            return true;
        }
        tracing::warn!(
            session = short(record.id()),
            requester,
            "unauthorized_access: requester does not own session"
        );
        false
    }

    fn with_authorized<T>(
        &self,
        id: &str,
        requester: &str,
        f: impl FnOnce(&mut SessionRecord, chrono::DateTime<chrono::Utc>) -> T,
    ) -> SessionResult<T> {
        let Some(slot) = self.slot(id) else {
            tracing::debug!(session = short(id), "session lookup missed");
            return Err(SessionError::NotFound);
        };
        let mut slot = slot.lock();
        if slot.removed || !self.authorized(&slot.record, requester) {
            return Err(SessionError::NotFound);
        }
        let now = self.clock.now();
        Ok(f(&mut slot.record, now))
    }

    /// Drop the least recently used session. Caller holds the map write lock.
    fn evict_oldest(&self, sessions: &mut HashMap<String, SlotHandle>) {
        let oldest = sessions
            .iter()
            .map(|(id, slot)| (id.clone(), slot.lock().record.last_access()))
            .min_by_key(|(_, last_access)| *last_access)
            .map(|(id, _)| id);
        let Some(id) = oldest else { return };
        let Some(handle) = sessions.remove(&id) else { return };
        let owner = {
            let mut slot = handle.lock();
            slot.removed = true;
            slot.record.owner().to_string()
        };
        self.unindex(&owner, &[id.as_str()]);
        tracing::warn!(session = short(&id), owner = owner.as_str(), "session_evicted: store full");
    }

    fn unindex(&self, owner: &str, ids: &[&str]) {
        let mut owners = self.owners.lock();
        for id in ids {
            remove_from_index(&mut owners, owner, id);
        }
    }
}

fn remove_from_index(owners: &mut HashMap<String, Vec<String>>, owner: &str, id: &str) {
    if let Some(ids) = owners.get_mut(owner) {
        ids.retain(|i| i != id);
        if ids.is_empty() {
            owners.remove(owner);
        }
    }
}

fn new_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Leading characters of a session id, enough to correlate log lines without leaking the id.
fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use crate::types::{DataSet, DataType, Field, Schema, Value};
    use chrono::{TimeDelta, Utc};

    fn store_with_clock(config: SessionConfig) -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (SessionStore::with_clock(config, clock.clone()), clock)
    }

    fn one_column(values: &[i64]) -> DataSet {
        DataSet::new(
            Schema::new(vec![Field::new("v", DataType::Int64)]),
            values.iter().map(|v| vec![Value::Int64(*v)]).collect(),
        )
    }

    #[test]
    fn ids_are_long_and_url_safe() {
        let id = new_session_id();
        assert_eq!(id.len(), 43);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(id, new_session_id());
    }

    #[test]
    fn create_get_delete_roundtrip() {
        let store = SessionStore::new(SessionConfig::default());
        let id = store.create("10.0.0.1", "a.csv", FileKind::Delimited).unwrap();
        let rec = store.get(&id, "10.0.0.1").unwrap();
        assert_eq!(rec.owner(), "10.0.0.1");
        assert_eq!(rec.row_count(), 0);
        assert!(store.delete(&id, "10.0.0.1"));
        assert_eq!(store.get(&id, "10.0.0.1"), Err(SessionError::NotFound));
        assert!(!store.delete(&id, "10.0.0.1"));
        assert!(store.list_for("10.0.0.1").is_empty());
    }

    #[test]
    fn foreign_requests_look_like_missing_sessions() {
        let store = SessionStore::new(SessionConfig::default());
        let id = store.create("a", "a.csv", FileKind::Delimited).unwrap();
        assert_eq!(store.get(&id, "b"), store.get("no-such-id", "b"));
        assert!(!store.update(&id, "b", SessionUpdate::new().table(one_column(&[1]))));
        assert!(!store.delete(&id, "b"));
        assert!(store.contains(&id));
        assert_eq!(store.get(&id, "a").unwrap().row_count(), 0);
    }

    #[test]
    fn update_is_visible_to_the_next_get() {
        let store = SessionStore::new(SessionConfig::default());
        let id = store.create("a", "a.csv", FileKind::Delimited).unwrap();
        let before = store.get(&id, "a").unwrap();
        assert!(store.update(&id, "a", SessionUpdate::new().table(one_column(&[1, 2, 3]))));
        let after = store.get(&id, "a").unwrap();
        assert_eq!(after.row_count(), 3);
        assert_eq!(after.table().row_count(), 3);
        assert_eq!(before.table().row_count(), 0);
    }

    #[test]
    fn get_refreshes_last_access_monotonically() {
        let (store, clock) = store_with_clock(SessionConfig::default());
        let id = store.create("a", "a.csv", FileKind::Delimited).unwrap();
        let created = store.get(&id, "a").unwrap().last_access();
        clock.advance(TimeDelta::seconds(30));
        let touched = store.get(&id, "a").unwrap().last_access();
        assert_eq!(touched - created, TimeDelta::seconds(30));
        clock.advance(TimeDelta::seconds(-60));
        assert_eq!(store.get(&id, "a").unwrap().last_access(), touched);
    }

    #[test]
    fn sweep_removes_only_idle_sessions() {
        let config = SessionConfig::default();
        let (store, clock) = store_with_clock(config);
        let stale = store.create("a", "old.csv", FileKind::Delimited).unwrap();
        let fresh = store.create("a", "new.csv", FileKind::Delimited).unwrap();

        clock.advance(TimeDelta::seconds(config.expiry_seconds as i64 + 1));
        store.get(&fresh, "a").unwrap();

        let report = store.sweep(config.expiry());
        assert_eq!(report, SweepReport { examined: 2, expired: 1 });
        assert!(!store.contains(&stale));
        assert!(store.contains(&fresh));
        let listed: Vec<String> = store.list_for("a").iter().map(|r| r.id().to_string()).collect();
        assert_eq!(listed, vec![fresh]);
    }

    #[test]
    fn full_store_rejects_or_evicts() {
        let config = SessionConfig {
            max_sessions: Some(2),
            ..SessionConfig::default()
        };
        let store = SessionStore::new(config);
        store.create("a", "1.csv", FileKind::Delimited).unwrap();
        store.create("a", "2.csv", FileKind::Delimited).unwrap();
        assert_eq!(
            store.create("a", "3.csv", FileKind::Delimited),
            Err(SessionError::StoreExhausted { live: 2, max: 2 })
        );

        let (store, clock) = store_with_clock(SessionConfig {
            evict_oldest_when_full: true,
            ..config
        });
        let first = store.create("a", "1.csv", FileKind::Delimited).unwrap();
        clock.advance(TimeDelta::seconds(1));
        let second = store.create("b", "2.csv", FileKind::Delimited).unwrap();
        clock.advance(TimeDelta::seconds(1));
        let third = store.create("c", "3.csv", FileKind::Delimited).unwrap();
        assert!(!store.contains(&first));
        assert!(store.contains(&second) && store.contains(&third));
        assert!(store.list_for("a").is_empty());
    }
}
