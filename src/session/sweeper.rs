use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SessionConfig;

use super::store::{SessionStore, SweepReport};

/// Handle to a running background sweeper.
///
/// Dropping the handle stops the sweeper after its current pass; [`SweeperHandle::shutdown`] does
/// the same and waits for the task to finish.
#[derive(Debug)]
pub struct SweeperHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "session sweeper ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn the periodic expiry sweep for `store` on the current tokio runtime.
///
/// Every `sweep_interval_seconds` the store drops sessions idle for longer than
/// `expiry_seconds`. The first pass runs one interval after spawning.
pub fn spawn_sweeper(store: Arc<SessionStore>, config: &SessionConfig) -> SweeperHandle {
    let expiry = config.expiry();
    tracing::info!(
        interval_secs = config.sweep_interval_seconds,
        expiry_secs = config.expiry_seconds,
        "starting session sweeper"
    );
    spawn_loop(config.sweep_interval(), move || store.sweep(expiry))
}

/// Runs `sweep` on the blocking pool every `interval`. A pass that panics is logged and the loop
/// carries on with the next tick.
fn spawn_loop<F>(interval: Duration, sweep: F) -> SweeperHandle
where
    F: Fn() -> SweepReport + Send + Sync + 'static,
{
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let sweep = Arc::new(sweep);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // `interval` fires immediately once; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let pass = Arc::clone(&sweep);
                    match tokio::task::spawn_blocking(move || pass()).await {
                        Ok(report) if report.expired > 0 => {
                            tracing::info!(examined = report.examined, expired = report.expired, "session sweep");
                        }
                        Ok(report) => tracing::debug!(examined = report.examined, "session sweep"),
                        Err(e) => tracing::error!(error = %e, "session sweep failed; will retry next interval"),
                    }
                }
            }
        }
        tracing::info!("session sweeper stopped");
    });

    SweeperHandle {
        stop: Some(stop_tx),
        task,
    }
}
