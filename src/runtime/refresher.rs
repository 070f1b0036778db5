use std::sync::Arc;

use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
    time::{Duration, MissedTickBehavior},
};
use tracing::info;

use crate::engine::service::ScoringEngine;

/// Handle to the background flag refresher.
///
/// Dropping the handle also stops the task at its next wake-up.
pub struct RefresherHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl RefresherHandle {
    /// Stops the refresher and waits for it to exit.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown_tx.send(true);
        self.join.await
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Refreshes the engine's flag index immediately and then every `interval`.
///
/// Ticks are measured from the previous tick, not from the end of the
/// previous refresh, so a newly started task becomes resolvable within one
/// interval. A refresh that overruns its tick delays the schedule instead of
/// bursting. Refresh failures are logged by the engine and the previous
/// snapshot is kept; the loop itself never stops on a storage error.
pub fn spawn_flag_refresher(engine: Arc<ScoringEngine>, interval: Duration) -> RefresherHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let join = tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "starting flag refresher");
        // `interval` panics on a zero period.
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let _ = engine.refresh_flags(engine.deadline()).await;
                }
            }
        }
        info!("flag refresher stopped");
    });

    RefresherHandle { shutdown_tx, join }
}
