use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};

use tabular_session::config::SessionConfig;
use tabular_session::error::SessionError;
use tabular_session::session::{spawn_sweeper, ManualClock, SessionStore};
use tabular_session::types::FileKind;

fn config() -> SessionConfig {
    SessionConfig {
        expiry_seconds: 60,
        sweep_interval_seconds: 10,
        ..SessionConfig::default()
    }
}

fn store_at_epoch() -> (Arc<SessionStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()));
    let store = Arc::new(SessionStore::with_clock(config(), clock.clone()));
    (store, clock)
}

#[test]
fn one_sweep_removes_only_idle_sessions() {
    let (store, clock) = store_at_epoch();
    let stale = store.create("a", "old.csv", FileKind::Delimited).unwrap();

    clock.advance(TimeDelta::seconds(61));
    let fresh = store.create("a", "new.csv", FileKind::Delimited).unwrap();

    let report = store.sweep(config().expiry());
    assert_eq!(report.examined, 2);
    assert_eq!(report.expired, 1);
    assert_eq!(store.get(&stale, "a"), Err(SessionError::NotFound));
    assert!(store.get(&fresh, "a").is_ok());
    assert_eq!(store.list_for("a").len(), 1);
}

#[test]
fn idle_exactly_the_expiry_survives() {
    let (store, clock) = store_at_epoch();
    let id = store.create("a", "f.csv", FileKind::Delimited).unwrap();

    clock.advance(TimeDelta::seconds(60));
    assert_eq!(store.sweep(config().expiry()).expired, 0);

    clock.advance(TimeDelta::seconds(1));
    assert_eq!(store.sweep(config().expiry()).expired, 1);
    assert!(!store.contains(&id));
}

#[test]
fn access_resets_the_idle_timer() {
    let (store, clock) = store_at_epoch();
    let id = store.create("a", "f.csv", FileKind::Delimited).unwrap();

    clock.advance(TimeDelta::seconds(50));
    store.get(&id, "a").unwrap();
    clock.advance(TimeDelta::seconds(50));
    assert_eq!(store.sweep(config().expiry()).expired, 0);
    assert!(store.contains(&id));
}

#[tokio::test(start_paused = true)]
async fn background_sweeper_expires_idle_sessions() {
    let (store, clock) = store_at_epoch();
    store.create("a", "f.csv", FileKind::Delimited).unwrap();
    let handle = spawn_sweeper(store.clone(), &config());

    clock.advance(TimeDelta::seconds(120));
    for _ in 0..10 {
        if store.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
    assert!(store.is_empty());
    assert!(!handle.is_finished());

    handle.shutdown().await;
}
