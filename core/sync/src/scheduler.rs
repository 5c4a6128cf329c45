//! Drain scheduling - periodic and connectivity-triggered.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::queue::SyncQueue;

/// Background drain triggers.
///
/// Owns one spawned task that drains the queue on a fixed interval while
/// online and immediately on every offline→online transition. Foreground
/// regain is the third trigger; it is driven by the caller (see
/// `DataOrchestrator::notify_foreground`) since only the platform layer
/// sees visibility changes.
pub struct SyncScheduler {
    shutdown: watch::Sender<bool>,
}

impl SyncScheduler {
    /// Start the scheduler task.
    pub fn start(
        queue: Arc<SyncQueue>,
        connectivity: &ConnectivityMonitor,
        drain_interval: Duration,
    ) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let mut conn_rx = connectivity.subscribe();
        let mut online = connectivity.is_online();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(drain_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; skip it so startup
            // drains stay under the caller's control.
            ticker.tick().await;

            info!("Sync scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if online && !queue.is_empty() {
                            debug!("Periodic drain");
                            if let Err(err) = queue.drain().await {
                                warn!(error = %err, "Periodic drain failed");
                            }
                        }
                    }

                    changed = conn_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let now_online = *conn_rx.borrow_and_update();
                        if now_online && !online {
                            debug!("Connectivity regained, draining");
                            if let Err(err) = queue.drain().await {
                                warn!(error = %err, "Reconnect drain failed");
                            }
                        }
                        online = now_online;
                    }

                    _ = shutdown_rx.changed() => {
                        info!("Sync scheduler shutting down");
                        break;
                    }
                }
            }
        });

        Self { shutdown }
    }

    /// Stop the scheduler task.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
