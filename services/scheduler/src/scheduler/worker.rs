//! Scheduler background worker.
//!
//! Fires a reconciliation tick on a fixed interval until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument};

use crate::service::{ShopService, TickOutcome};

/// Periodic driver for [`ShopService::tick`].
pub struct SchedulerWorker {
    service: Arc<ShopService>,
    interval: Duration,
}

impl SchedulerWorker {
    pub fn new(service: Arc<ShopService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Run the scheduler worker until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting scheduler worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        // A slow cycle drops the ticks it overran instead of bursting.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Don't tick on startup; wait for the first interval.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.service.tick().await {
                        Ok(TickOutcome::Completed(_)) => {}
                        Ok(TickOutcome::Skipped) => debug!("Previous cycle still running"),
                        Err(e) => error!(error = %e, "Scheduler reconciliation failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Scheduler worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
