//! Connectivity monitoring.

use tokio::sync::watch;
use tracing::info;

use crate::events::{EventBus, SyncEvent};

/// Observes online/offline transitions.
///
/// Wraps the platform's connectivity signal as a watch channel: platform
/// glue (or a probe task) calls [`set_online`](ConnectivityMonitor::set_online),
/// subscribers observe transitions through [`subscribe`](ConnectivityMonitor::subscribe)
/// and unsubscribe by dropping the receiver. Transitions are also emitted
/// on the event bus as [`SyncEvent::Online`] / [`SyncEvent::Offline`].
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
    events: EventBus,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial state.
    pub fn new(initially_online: bool, events: EventBus) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self { state, events }
    }

    /// Current connectivity state.
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Record a connectivity change. No-op when the state is unchanged.
    pub fn set_online(&self, online: bool) {
        let changed = self.state.send_if_modified(|state| {
            if *state != online {
                *state = online;
                true
            } else {
                false
            }
        });

        if changed {
            info!(online, "Connectivity changed");
            self.events.emit(if online {
                SyncEvent::Online
            } else {
                SyncEvent::Offline
            });
        }
    }

    /// Subscribe to connectivity transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}
