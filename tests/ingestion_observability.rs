use std::sync::{Arc, Mutex};

use tabular_session::ingestion::{
    ingest, CompositeObserver, IngestionContext, IngestionObserver, IngestionOptions, IngestionSeverity,
    IngestionStats,
};
use tabular_session::IngestionError;

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<IngestionStats>>,
    failures: Mutex<Vec<IngestionSeverity>>,
    alerts: Mutex<Vec<IngestionSeverity>>,
}

impl IngestionObserver for RecordingObserver {
    fn on_success(&self, _ctx: &IngestionContext, stats: IngestionStats) {
        self.successes.lock().unwrap().push(stats);
    }

    fn on_failure(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn observed(obs: &Arc<RecordingObserver>, alert_at_or_above: IngestionSeverity) -> IngestionOptions {
    IngestionOptions {
        observer: Some(obs.clone()),
        alert_at_or_above,
        ..IngestionOptions::default()
    }
}

#[test]
fn unreadable_input_is_critical_and_alerts() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = observed(&obs, IngestionSeverity::Critical);

    let err = ingest("broken.csv", b"a,b\n1,2,3\n", None, &opts).unwrap_err();
    assert!(matches!(err, IngestionError::ParseFailed { .. }));

    assert_eq!(*obs.failures.lock().unwrap(), vec![IngestionSeverity::Critical]);
    assert_eq!(*obs.alerts.lock().unwrap(), vec![IngestionSeverity::Critical]);
    assert!(obs.successes.lock().unwrap().is_empty());
}

#[test]
fn structural_failure_is_an_error_below_the_default_alert_threshold() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = observed(&obs, IngestionSeverity::Critical);

    let err = ingest("index.csv", b"Unnamed: 0,v\n0,1\n", None, &opts).unwrap_err();
    assert!(matches!(err, IngestionError::StructuralValidationFailed { .. }));

    assert_eq!(*obs.failures.lock().unwrap(), vec![IngestionSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());
}

#[test]
fn lowered_threshold_alerts_on_errors() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = observed(&obs, IngestionSeverity::Error);

    let _ = ingest("bad.csv", b"a\n1\n", Some("not-a-charset"), &opts).unwrap_err();
    assert_eq!(*obs.alerts.lock().unwrap(), vec![IngestionSeverity::Error]);
}

#[test]
fn success_reports_shape_and_chunking() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = IngestionOptions {
        chunk_size: 4,
        ..observed(&obs, IngestionSeverity::Critical)
    };

    let mut csv = String::from("k,v\n");
    for i in 0..12 {
        csv.push_str(&format!("{i},{}\n", i * i));
    }
    ingest("squares.csv", csv.as_bytes(), None, &opts).unwrap();

    assert_eq!(
        *obs.successes.lock().unwrap(),
        vec![IngestionStats {
            rows: 12,
            columns: 2,
            chunked: true,
            truncated: false,
        }]
    );
    assert!(obs.failures.lock().unwrap().is_empty());
}

#[test]
fn composite_fans_out_to_every_observer() {
    let a = Arc::new(RecordingObserver::default());
    let b = Arc::new(RecordingObserver::default());
    let observers: Vec<Arc<dyn IngestionObserver>> = vec![a.clone(), b.clone()];
    let opts = IngestionOptions {
        observer: Some(Arc::new(CompositeObserver::new(observers))),
        ..IngestionOptions::default()
    };

    ingest("ok.csv", b"x,y\n1,2\n", None, &opts).unwrap();
    assert_eq!(a.successes.lock().unwrap().len(), 1);
    assert_eq!(b.successes.lock().unwrap().len(), 1);
}
