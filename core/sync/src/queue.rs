//! Durable priority write queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use coachsync_common::{Clock, Error, ResourceKey, ResourceType, Result};
use coachsync_storage::{LocalMirror, RemoteApi};

use crate::backoff::BackoffPolicy;
use crate::events::{EventBus, OperationSummary, SyncEvent};

/// Mirror key holding the full queue snapshot.
pub const QUEUE_MIRROR_KEY: &str = "sync/queue";

/// Delivery priority. Higher priorities drain first; insertion order
/// breaks ties within a tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

/// Lifecycle of a queued operation.
///
/// `Pending → InFlight → {Done, Pending (retry), Failed}`. Done and
/// Failed are terminal; both leave the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    InFlight,
    Done,
    Failed,
}

/// A queued write waiting for delivery to the remote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueOperation {
    pub id: Uuid,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub payload: Value,
    pub priority: Priority,
    pub attempts: u32,
    pub status: OperationStatus,
    pub created_at: DateTime<Utc>,
    /// Backoff gate: drains skip the operation until this instant.
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Insertion order, tiebreaker within a priority tier.
    pub(crate) seq: u64,
}

impl QueueOperation {
    /// The (type, id) pair this operation targets.
    pub fn target(&self) -> ResourceKey {
        ResourceKey {
            resource_type: self.resource_type,
            id: self.resource_id.clone(),
        }
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.is_none_or(|at| at <= now)
    }

    fn summary(&self, error: &Error) -> OperationSummary {
        OperationSummary {
            id: self.id,
            resource_type: self.resource_type,
            resource_id: self.resource_id.clone(),
            priority: self.priority,
            attempts: self.attempts,
            error: error.to_string(),
        }
    }
}

/// Remote delivery seam for one operation type.
///
/// Handlers must be idempotent: delivery is at-least-once.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn push(&self, operation: &QueueOperation) -> Result<Value>;
}

/// Default handler delegating to the remote API's push endpoint.
pub struct RemoteApiHandler {
    remote: Arc<dyn RemoteApi>,
}

impl RemoteApiHandler {
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl SyncHandler for RemoteApiHandler {
    async fn push(&self, operation: &QueueOperation) -> Result<Value> {
        self.remote
            .push(
                operation.resource_type,
                &operation.resource_id,
                &operation.payload,
            )
            .await
    }
}

/// Outcome of one drain invocation.
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    /// Operations delivered and removed.
    pub processed: usize,
    /// Operations terminally failed and removed.
    pub failed: usize,
    /// Operations still queued after the pass.
    pub remaining: usize,
    /// True when the call was a no-op because a drain was active.
    pub skipped: bool,
}

/// Priority write queue, persisted through the LocalMirror.
///
/// At most one Pending operation exists per target: a newer write for the
/// same (type, id) replaces the queued payload instead of appending
/// (latest-write-wins). Every mutation is mirrored before the mutating
/// call returns, so a restart resumes with the same pending set.
pub struct SyncQueue {
    ops: RwLock<Vec<QueueOperation>>,
    mirror: Arc<dyn LocalMirror>,
    handlers: RwLock<std::collections::HashMap<ResourceType, Arc<dyn SyncHandler>>>,
    default_handler: RwLock<Option<Arc<dyn SyncHandler>>>,
    backoff: BackoffPolicy,
    clock: Arc<dyn Clock>,
    events: EventBus,
    draining: AtomicBool,
    next_seq: AtomicU64,
    last_sync_at: RwLock<Option<DateTime<Utc>>>,
}

impl SyncQueue {
    /// Create an empty queue. Call [`load`](SyncQueue::load) to resume a
    /// persisted pending set.
    pub fn new(
        mirror: Arc<dyn LocalMirror>,
        backoff: BackoffPolicy,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        Self {
            ops: RwLock::new(Vec::new()),
            mirror,
            handlers: RwLock::new(std::collections::HashMap::new()),
            default_handler: RwLock::new(None),
            backoff,
            clock,
            events,
            draining: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            last_sync_at: RwLock::new(None),
        }
    }

    /// Register the delivery handler for one operation type.
    pub fn register_handler(&self, resource_type: ResourceType, handler: Arc<dyn SyncHandler>) {
        self.handlers.write().unwrap().insert(resource_type, handler);
    }

    /// Register the handler used for types without a specific one.
    pub fn set_default_handler(&self, handler: Arc<dyn SyncHandler>) {
        *self.default_handler.write().unwrap() = Some(handler);
    }

    /// Restore the pending set from the mirror.
    ///
    /// A corrupted snapshot is discarded with a warning and the queue
    /// starts cold. Operations caught InFlight by a crash go back to
    /// Pending.
    pub async fn load(&self) -> Result<()> {
        let Some(snapshot) = self.mirror.get(QUEUE_MIRROR_KEY).await? else {
            return Ok(());
        };

        let mut restored: Vec<QueueOperation> = match serde_json::from_str(&snapshot) {
            Ok(ops) => ops,
            Err(err) => {
                warn!(error = %err, "Discarding corrupted queue snapshot");
                self.mirror.remove(QUEUE_MIRROR_KEY).await?;
                return Ok(());
            }
        };

        for op in &mut restored {
            if op.status == OperationStatus::InFlight {
                op.status = OperationStatus::Pending;
            }
        }

        let max_seq = restored.iter().map(|op| op.seq).max();
        self.next_seq
            .store(max_seq.map_or(0, |s| s + 1), Ordering::SeqCst);

        debug!(count = restored.len(), "Restored queue from mirror");
        *self.ops.write().unwrap() = restored;
        Ok(())
    }

    /// Queue a write for delivery.
    ///
    /// Replaces the payload of an existing Pending operation for the same
    /// target; appends otherwise. Persisted before returning.
    pub async fn enqueue(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        payload: Value,
        priority: Priority,
    ) -> Result<Uuid> {
        let now = self.clock.now();

        let id = {
            let mut ops = self.ops.write().unwrap();
            let existing = ops.iter_mut().find(|op| {
                op.status == OperationStatus::Pending
                    && op.resource_type == resource_type
                    && op.resource_id == resource_id
            });

            match existing {
                Some(op) => {
                    debug!(target = %op.target(), "Superseding queued write");
                    op.payload = payload;
                    op.priority = priority;
                    op.created_at = now;
                    // A superseding write is a new logical operation
                    op.attempts = 0;
                    op.next_attempt_at = None;
                    op.id
                }
                None => {
                    let op = QueueOperation {
                        id: Uuid::new_v4(),
                        resource_type,
                        resource_id: resource_id.to_string(),
                        payload,
                        priority,
                        attempts: 0,
                        status: OperationStatus::Pending,
                        created_at: now,
                        next_attempt_at: None,
                        seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
                    };
                    let id = op.id;
                    debug!(target = %op.target(), "Queued write");
                    ops.push(op);
                    id
                }
            }
        };

        self.persist().await?;
        Ok(id)
    }

    /// Deliver queued operations, in priority order.
    ///
    /// Single-flight: a call while another drain is active is a no-op.
    /// Operations enqueued during the pass wait for the next one.
    pub async fn drain(&self) -> Result<DrainReport> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Drain already in progress, skipping");
            return Ok(DrainReport {
                remaining: self.len(),
                skipped: true,
                ..DrainReport::default()
            });
        }

        self.events.emit(SyncEvent::SyncStarted);
        let result = self.drain_pass().await;
        self.draining.store(false, Ordering::SeqCst);

        if let Ok(report) = &result {
            self.events.emit(SyncEvent::SyncCompleted {
                processed: report.processed,
                failed: report.failed,
                remaining: report.remaining,
            });
        }
        result
    }

    async fn drain_pass(&self) -> Result<DrainReport> {
        let now = self.clock.now();

        // Snapshot of what is due right now; later enqueues wait for the
        // next pass.
        let due: Vec<Uuid> = {
            let ops = self.ops.read().unwrap();
            let mut due: Vec<&QueueOperation> = ops
                .iter()
                .filter(|op| op.status == OperationStatus::Pending && op.is_due(now))
                .collect();
            due.sort_by_key(|op| (op.priority, op.seq));
            due.iter().map(|op| op.id).collect()
        };

        debug!(due = due.len(), "Starting drain pass");
        let mut processed = 0;
        let mut failed = 0;

        for op_id in due {
            // Re-read the live operation: a supersede since the snapshot
            // must win.
            let op = {
                let mut ops = self.ops.write().unwrap();
                match ops.iter_mut().find(|op| op.id == op_id) {
                    Some(op) if op.status == OperationStatus::Pending => {
                        op.status = OperationStatus::InFlight;
                        Some(op.clone())
                    }
                    _ => None,
                }
            };
            let Some(op) = op else { continue };
            self.persist().await?;

            let Some(handler) = self.handler_for(op.resource_type) else {
                warn!(target = %op.target(), "No sync handler registered, leaving queued");
                self.update_op(op.id, |op| op.status = OperationStatus::Pending);
                self.persist().await?;
                continue;
            };

            match handler.push(&op).await {
                Ok(_) => {
                    debug!(target = %op.target(), "Delivered queued write, marking done");
                    self.remove_op(op.id);
                    processed += 1;
                }
                Err(Error::NotAuthenticated) => {
                    // Re-authentication is the caller's move; the data
                    // stays queued and the pass stops here.
                    warn!(target = %op.target(), "Not authenticated, halting drain");
                    self.update_op(op.id, |op| op.status = OperationStatus::Pending);
                    self.persist().await?;
                    break;
                }
                Err(err) if err.is_transient() => {
                    let attempts = op.attempts + 1;
                    if attempts >= self.backoff.max_retries {
                        warn!(
                            target = %op.target(),
                            attempts,
                            error = %err,
                            "Retries exhausted, failing operation"
                        );
                        self.fail_op(&op, attempts, &err);
                        failed += 1;
                    } else {
                        let delay = self.backoff.delay_for_attempt(attempts);
                        debug!(
                            target = %op.target(),
                            attempts,
                            delay_ms = delay.num_milliseconds(),
                            error = %err,
                            "Transient failure, will retry"
                        );
                        self.update_op(op.id, |op| {
                            op.attempts = attempts;
                            op.status = OperationStatus::Pending;
                            op.next_attempt_at = Some(now + delay);
                        });
                    }
                }
                Err(err) => {
                    warn!(target = %op.target(), error = %err, "Remote rejected operation");
                    self.fail_op(&op, op.attempts + 1, &err);
                    failed += 1;
                }
            }
            self.persist().await?;
        }

        *self.last_sync_at.write().unwrap() = Some(self.clock.now());

        let remaining = self.len();
        debug!(processed, failed, remaining, "Drain pass finished");
        Ok(DrainReport {
            processed,
            failed,
            remaining,
            skipped: false,
        })
    }

    /// Whether a drain pass is currently active.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.read().unwrap().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.read().unwrap().is_empty()
    }

    /// Completion time of the most recent drain pass.
    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        *self.last_sync_at.read().unwrap()
    }

    /// Snapshot of queued operations, in drain order.
    pub fn pending_operations(&self) -> Vec<QueueOperation> {
        let ops = self.ops.read().unwrap();
        let mut snapshot: Vec<QueueOperation> = ops.clone();
        snapshot.sort_by_key(|op| (op.priority, op.seq));
        snapshot
    }

    fn handler_for(&self, resource_type: ResourceType) -> Option<Arc<dyn SyncHandler>> {
        self.handlers
            .read()
            .unwrap()
            .get(&resource_type)
            .cloned()
            .or_else(|| self.default_handler.read().unwrap().clone())
    }

    fn update_op(&self, id: Uuid, mutate: impl FnOnce(&mut QueueOperation)) {
        let mut ops = self.ops.write().unwrap();
        if let Some(op) = ops.iter_mut().find(|op| op.id == id) {
            mutate(op);
        }
    }

    /// Take an operation out of the queue as it reaches a terminal state.
    fn remove_op(&self, id: Uuid) {
        let mut ops = self.ops.write().unwrap();
        if let Some(pos) = ops.iter().position(|op| op.id == id) {
            ops.remove(pos);
        }
    }

    fn fail_op(&self, op: &QueueOperation, attempts: u32, err: &Error) {
        self.remove_op(op.id);
        let mut summary = op.summary(err);
        summary.attempts = attempts;
        self.events
            .emit(SyncEvent::OperationFailed { operation: summary });
    }

    /// Mirror the current queue contents. Called after every mutation,
    /// before the mutating call returns.
    async fn persist(&self) -> Result<()> {
        let snapshot = {
            let ops = self.ops.read().unwrap();
            serde_json::to_string(&*ops).map_err(|e| Error::Serialization(e.to_string()))?
        };
        self.mirror.set(QUEUE_MIRROR_KEY, &snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coachsync_common::ManualClock;
    use coachsync_storage::{MemoryMirror, MemoryRemote};
    use serde_json::json;
    use std::time::Duration as StdDuration;

    struct Fixture {
        queue: Arc<SyncQueue>,
        remote: Arc<MemoryRemote>,
        mirror: Arc<MemoryMirror>,
        clock: Arc<ManualClock>,
        events: EventBus,
    }

    fn fixture() -> Fixture {
        fixture_with_backoff(BackoffPolicy::default())
    }

    fn fixture_with_backoff(backoff: BackoffPolicy) -> Fixture {
        let mirror = Arc::new(MemoryMirror::new());
        let remote = Arc::new(MemoryRemote::new());
        let clock = Arc::new(ManualClock::default());
        let events = EventBus::new();

        let queue = Arc::new(SyncQueue::new(
            mirror.clone(),
            backoff,
            clock.clone(),
            events.clone(),
        ));
        queue.set_default_handler(Arc::new(RemoteApiHandler::new(remote.clone())));

        Fixture {
            queue,
            remote,
            mirror,
            clock,
            events,
        }
    }

    #[tokio::test]
    async fn test_enqueue_dedup_keeps_latest_payload() {
        let f = fixture();

        f.queue
            .enqueue(ResourceType::Metrics, "u1", json!({"steps": 100}), Priority::Normal)
            .await
            .unwrap();
        f.queue
            .enqueue(ResourceType::Metrics, "u1", json!({"steps": 150}), Priority::Normal)
            .await
            .unwrap();

        assert_eq!(f.queue.len(), 1);

        let report = f.queue.drain().await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.remaining, 0);

        // Exactly one remote call, carrying the last payload
        assert_eq!(f.remote.push_count(), 1);
        assert_eq!(f.remote.pushes()[0].1["steps"], 150);
    }

    #[tokio::test]
    async fn test_distinct_targets_are_not_deduplicated() {
        let f = fixture();

        f.queue
            .enqueue(ResourceType::Metrics, "u1", json!(1), Priority::Normal)
            .await
            .unwrap();
        f.queue
            .enqueue(ResourceType::Metrics, "u2", json!(2), Priority::Normal)
            .await
            .unwrap();
        f.queue
            .enqueue(ResourceType::Profile, "u1", json!(3), Priority::Normal)
            .await
            .unwrap();

        assert_eq!(f.queue.len(), 3);
    }

    #[tokio::test]
    async fn test_drain_order_priority_then_insertion() {
        let f = fixture();

        f.queue
            .enqueue(ResourceType::Metrics, "low", json!(1), Priority::Low)
            .await
            .unwrap();
        f.queue
            .enqueue(ResourceType::Metrics, "n1", json!(2), Priority::Normal)
            .await
            .unwrap();
        f.queue
            .enqueue(ResourceType::Chat, "high", json!(3), Priority::High)
            .await
            .unwrap();
        f.queue
            .enqueue(ResourceType::Metrics, "n2", json!(4), Priority::Normal)
            .await
            .unwrap();

        f.queue.drain().await.unwrap();

        let order: Vec<String> = f.remote.pushes().into_iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["chat:high", "metrics:n1", "metrics:n2", "metrics:low"]);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_then_fails_terminally() {
        let f = fixture_with_backoff(
            BackoffPolicy::new(3).with_base(chrono::Duration::seconds(2)),
        );
        let mut events = f.events.subscribe();

        f.queue
            .enqueue(ResourceType::Metrics, "u1", json!({"steps": 1}), Priority::Normal)
            .await
            .unwrap();
        f.remote.set_failure(Some(Error::NetworkTimeout));

        // Attempt 1: stays queued with a backoff gate
        let report = f.queue.drain().await.unwrap();
        assert_eq!(report.failed, 0);
        assert_eq!(report.remaining, 1);
        let op = &f.queue.pending_operations()[0];
        assert_eq!(op.attempts, 1);
        assert!(op.next_attempt_at.is_some());

        // Not due yet: a drain before the gate does nothing
        let report = f.queue.drain().await.unwrap();
        assert_eq!(f.remote.push_count(), 1);
        assert_eq!(report.remaining, 1);

        // Attempt 2
        f.clock.advance(chrono::Duration::seconds(3));
        f.queue.drain().await.unwrap();
        assert_eq!(f.queue.pending_operations()[0].attempts, 2);

        // Attempt 3: retries exhausted, removed and reported
        f.clock.advance(chrono::Duration::seconds(5));
        let report = f.queue.drain().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.remaining, 0);
        assert!(f.queue.is_empty());
        assert_eq!(f.remote.push_count(), 3);

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let SyncEvent::OperationFailed { operation } = event {
                assert_eq!(operation.resource_id, "u1");
                assert_eq!(operation.attempts, 3);
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_terminal_rejection_fails_after_single_attempt() {
        let f = fixture();
        let mut events = f.events.subscribe();

        f.queue
            .enqueue(ResourceType::Profile, "u1", json!({}), Priority::Normal)
            .await
            .unwrap();
        f.remote.set_failure(Some(Error::RemoteRejected {
            status: 422,
            message: "invalid field".into(),
        }));

        let report = f.queue.drain().await.unwrap();
        assert_eq!(report.failed, 1);
        assert!(f.queue.is_empty());
        assert_eq!(f.remote.push_count(), 1);

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let SyncEvent::OperationFailed { operation } = event {
                assert_eq!(operation.attempts, 1);
                assert!(operation.error.contains("422"));
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_auth_failure_halts_drain_and_preserves_queue() {
        let f = fixture();

        f.queue
            .enqueue(ResourceType::Metrics, "u1", json!(1), Priority::Normal)
            .await
            .unwrap();
        f.queue
            .enqueue(ResourceType::Metrics, "u2", json!(2), Priority::Normal)
            .await
            .unwrap();
        f.remote.set_failure(Some(Error::NotAuthenticated));

        let report = f.queue.drain().await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(report.remaining, 2);

        // One probe, then the pass halted; attempts untouched
        assert_eq!(f.remote.push_count(), 1);
        assert!(f.queue.pending_operations().iter().all(|op| op.attempts == 0));
    }

    #[tokio::test]
    async fn test_drain_is_single_flight() {
        let f = fixture();

        f.queue
            .enqueue(ResourceType::Metrics, "u1", json!(1), Priority::Normal)
            .await
            .unwrap();
        f.remote.set_latency(Some(StdDuration::from_millis(50)));

        let (a, b) = tokio::join!(f.queue.drain(), f.queue.drain());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.skipped, b.skipped);
        assert_eq!(f.remote.push_count(), 1);
    }

    #[tokio::test]
    async fn test_queue_survives_restart() {
        let f = fixture();

        f.queue
            .enqueue(ResourceType::Nutrition, "u1", json!({"kcal": 2200}), Priority::High)
            .await
            .unwrap();

        // New queue over the same mirror sees the same pending set
        let restored = SyncQueue::new(
            f.mirror.clone(),
            BackoffPolicy::default(),
            f.clock.clone(),
            EventBus::new(),
        );
        restored.load().await.unwrap();

        assert_eq!(restored.len(), 1);
        let op = &restored.pending_operations()[0];
        assert_eq!(op.resource_id, "u1");
        assert_eq!(op.payload["kcal"], 2200);
        assert_eq!(op.priority, Priority::High);
    }

    #[tokio::test]
    async fn test_queue_survives_restart_on_disk() {
        use coachsync_storage::FileMirror;

        let temp = tempfile::TempDir::new().unwrap();
        let mirror = Arc::new(FileMirror::new(temp.path()).unwrap());
        let clock = Arc::new(ManualClock::default());

        {
            let queue = SyncQueue::new(
                mirror.clone(),
                BackoffPolicy::default(),
                clock.clone(),
                EventBus::new(),
            );
            queue
                .enqueue(ResourceType::Metrics, "u1", json!({"steps": 42}), Priority::Normal)
                .await
                .unwrap();
        }

        // Same directory, fresh process
        let mirror = Arc::new(FileMirror::new(temp.path()).unwrap());
        let queue = SyncQueue::new(mirror, BackoffPolicy::default(), clock, EventBus::new());
        queue.load().await.unwrap();

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending_operations()[0].payload["steps"], 42);
    }

    #[tokio::test]
    async fn test_corrupted_snapshot_self_heals() {
        let f = fixture();
        f.mirror.set(QUEUE_MIRROR_KEY, "{not json").await.unwrap();

        f.queue.load().await.unwrap();
        assert!(f.queue.is_empty());
        // The corrupted snapshot is gone
        assert_eq!(f.mirror.get(QUEUE_MIRROR_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_in_flight_operations_reset_on_load() {
        let f = fixture();
        f.queue
            .enqueue(ResourceType::Metrics, "u1", json!(1), Priority::Normal)
            .await
            .unwrap();

        // Forge a snapshot of a crash mid-drain
        let mut ops = f.queue.pending_operations();
        ops[0].status = OperationStatus::InFlight;
        f.mirror
            .set(QUEUE_MIRROR_KEY, &serde_json::to_string(&ops).unwrap())
            .await
            .unwrap();

        let restored = SyncQueue::new(
            f.mirror.clone(),
            BackoffPolicy::default(),
            f.clock.clone(),
            EventBus::new(),
        );
        restored.load().await.unwrap();
        assert_eq!(
            restored.pending_operations()[0].status,
            OperationStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_drain_emits_start_and_complete_events() {
        let f = fixture();
        let mut events = f.events.subscribe();

        f.queue
            .enqueue(ResourceType::Chat, "c1", json!("hello"), Priority::Normal)
            .await
            .unwrap();
        f.queue.drain().await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), SyncEvent::SyncStarted));
        assert!(matches!(
            events.recv().await.unwrap(),
            SyncEvent::SyncCompleted {
                processed: 1,
                failed: 0,
                remaining: 0
            }
        ));
    }
}
