//! Typed sync event stream.
//!
//! Subscribers get a broadcast receiver; dropping it unsubscribes. No ad
//! hoc callback lists, no listener leaks.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use coachsync_common::ResourceType;

use crate::queue::Priority;

/// Buffered events per subscriber before lagging ones drop messages.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by the sync engine.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A drain pass began.
    SyncStarted,
    /// A drain pass finished.
    SyncCompleted {
        processed: usize,
        failed: usize,
        remaining: usize,
    },
    /// An operation exhausted its retries or was rejected terminally.
    OperationFailed { operation: OperationSummary },
    /// Connectivity came back.
    Online,
    /// Connectivity was lost.
    Offline,
}

/// Metadata of a terminally failed operation, carried on
/// [`SyncEvent::OperationFailed`].
#[derive(Debug, Clone, Serialize)]
pub struct OperationSummary {
    pub id: Uuid,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub priority: Priority,
    pub attempts: u32,
    pub error: String,
}

/// Broadcast bus for sync events.
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create a new bus.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: SyncEvent) {
        // send fails only when nobody is listening
        if self.tx.send(event).is_err() {
            trace!("Sync event emitted with no subscribers");
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
