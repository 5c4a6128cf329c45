//! CoachSync write-behind synchronization.
//!
//! This module keeps local writes flowing to the remote under unreliable
//! networking:
//! - Durable priority queue, deduplicated per target (latest-write-wins)
//! - Retry with backoff for transient failures, terminal-failure events
//!   for the rest
//! - Connectivity monitoring with a typed subscription surface
//! - Drain scheduling on reconnect and on a periodic timer

pub mod backoff;
pub mod connectivity;
pub mod events;
pub mod queue;
pub mod scheduler;

pub use backoff::BackoffPolicy;
pub use connectivity::ConnectivityMonitor;
pub use events::{EventBus, OperationSummary, SyncEvent};
pub use queue::{
    DrainReport, OperationStatus, Priority, QueueOperation, RemoteApiHandler, SyncHandler,
    SyncQueue, QUEUE_MIRROR_KEY,
};
pub use scheduler::SyncScheduler;
