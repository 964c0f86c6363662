//! Background token refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::controller::{RefreshOutcome, SessionController};

/// `tokio::time::interval` rejects a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Running refresh loop. Dropping the handle stops the loop at its next tick.
pub struct RefreshHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stop the loop and wait for it to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

/// Check the token every `interval` and refresh it once it is within
/// `buffer` of expiring. An expired token logs the session out.
pub fn spawn_refresh_loop(
    controller: Arc<SessionController>,
    interval: Duration,
    buffer: chrono::Duration,
) -> RefreshHandle {
    let (tx, mut rx) = oneshot::channel::<()>();

    let interval = interval.max(MIN_INTERVAL);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so startup is not
        // racing `init`.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut rx => break,
                _ = ticker.tick() => {
                    match controller.refresh_if_due(buffer).await {
                        RefreshOutcome::LoggedOut => info!("Session ended by refresh loop"),
                        outcome => debug!(?outcome, "Refresh tick"),
                    }
                }
            }
        }
        debug!("Refresh loop stopped");
    });

    RefreshHandle {
        shutdown: Some(tx),
        task,
    }
}
