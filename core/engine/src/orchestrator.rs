//! Data orchestration facade.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use coachsync_cache::{CacheStats, CacheStore, MirroredEntry};
use coachsync_common::{CacheKey, Clock, Error, ResourceType, Result, SystemClock};
use coachsync_storage::{LocalMirror, RemoteApi};
use coachsync_sync::{
    BackoffPolicy, ConnectivityMonitor, DrainReport, EventBus, Priority, QueueOperation,
    RemoteApiHandler, SyncEvent, SyncHandler, SyncQueue, SyncScheduler,
};

use crate::config::EngineConfig;

/// Mirror key prefix for durable cache snapshots.
const CACHE_MIRROR_PREFIX: &str = "cache/";

/// Options for [`DataOrchestrator::read`].
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Skip the cache and fetch from the remote.
    pub force_refresh: bool,
    /// On remote failure, serve the last mirrored value (even expired),
    /// tagged stale, instead of surfacing the error.
    pub fallback_to_stale: bool,
    /// Remote fetch deadline; the engine default applies when `None`.
    pub timeout: Option<std::time::Duration>,
}

/// Options for [`DataOrchestrator::write`].
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Try a direct remote push before falling back to the queue.
    pub sync_immediately: bool,
    /// Queue priority when the write is deferred.
    pub priority: Priority,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sync_immediately: true,
            priority: Priority::Normal,
        }
    }
}

/// A value returned by [`DataOrchestrator::read`].
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub value: Value,
    /// True when the value came from the stale-fallback path and may be
    /// outdated.
    pub stale: bool,
}

/// Live view over the sync machinery, for UI and observability.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub is_online: bool,
    pub in_progress: bool,
    pub queue_length: usize,
    pub pending_operations: Vec<QueueOperation>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Value>>>;

struct EngineRuntime {
    scheduler: SyncScheduler,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Public facade over cache, queue, connectivity, and the remote.
///
/// Owns the cache store and sync queue for its lifetime. Constructed by
/// the application root and shared behind an `Arc`; tests build isolated
/// instances over in-memory collaborators.
pub struct DataOrchestrator {
    remote: Arc<dyn RemoteApi>,
    mirror: Arc<dyn LocalMirror>,
    cache: Arc<CacheStore>,
    queue: Arc<SyncQueue>,
    connectivity: Arc<ConnectivityMonitor>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    /// In-flight remote reads, keyed by cache key. Concurrent reads of
    /// one key share a single fetch.
    pending_reads: Mutex<HashMap<String, SharedFetch>>,
    /// Completion time of the latest successful direct push.
    last_push_at: RwLock<Option<DateTime<Utc>>>,
    runtime: Mutex<Option<EngineRuntime>>,
}

impl DataOrchestrator {
    /// Create an engine over the given collaborators.
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        mirror: Arc<dyn LocalMirror>,
        config: EngineConfig,
    ) -> Self {
        Self::with_clock(remote, mirror, config, Arc::new(SystemClock))
    }

    /// Create an engine with an injected clock.
    pub fn with_clock(
        remote: Arc<dyn RemoteApi>,
        mirror: Arc<dyn LocalMirror>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let events = EventBus::new();
        let connectivity = Arc::new(ConnectivityMonitor::new(true, events.clone()));

        let cache = Arc::new(
            CacheStore::new(config.ttl_policy.clone(), clock.clone())
                .with_max_entries(config.max_cache_entries),
        );

        let backoff = BackoffPolicy::new(config.max_retries).with_base(
            chrono::Duration::from_std(config.backoff_base)
                .unwrap_or_else(|_| chrono::Duration::seconds(2)),
        );
        let queue = Arc::new(SyncQueue::new(
            mirror.clone(),
            backoff,
            clock.clone(),
            events.clone(),
        ));
        queue.set_default_handler(Arc::new(RemoteApiHandler::new(remote.clone())));

        Self {
            remote,
            mirror,
            cache,
            queue,
            connectivity,
            events,
            clock,
            config,
            pending_reads: Mutex::new(HashMap::new()),
            last_push_at: RwLock::new(None),
            runtime: Mutex::new(None),
        }
    }

    /// Restore persisted state and spawn the background triggers
    /// (periodic drain, cache sweep, reconnect handling).
    ///
    /// Takes the shared handle; clone the `Arc` to keep using the engine.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        self.queue.load().await?;

        let mut runtime = self.runtime.lock().unwrap();
        if runtime.is_some() {
            return Ok(());
        }

        let scheduler = SyncScheduler::start(
            self.queue.clone(),
            &self.connectivity,
            self.config.drain_interval,
        );

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let mut conn_rx = self.connectivity.subscribe();
        let orchestrator = self.clone();

        let handle = tokio::spawn(async move {
            let mut sweep = tokio::time::interval(orchestrator.config.sweep_interval);
            sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            sweep.tick().await;
            let mut online = orchestrator.connectivity.is_online();

            loop {
                tokio::select! {
                    _ = sweep.tick() => {
                        orchestrator.cache.sweep();
                    }

                    changed = conn_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let now_online = *conn_rx.borrow_and_update();
                        if now_online && !online {
                            orchestrator.refresh_critical_keys().await;
                        }
                        online = now_online;
                    }

                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }
        });

        *runtime = Some(EngineRuntime {
            scheduler,
            shutdown,
            handle,
        });
        Ok(())
    }

    /// Stop the background triggers. Queued writes stay mirrored.
    pub fn stop(&self) {
        if let Some(runtime) = self.runtime.lock().unwrap().take() {
            runtime.scheduler.shutdown();
            let _ = runtime.shutdown.send(true);
            runtime.handle.abort();
        }
    }

    /// Read a resource.
    ///
    /// Cache hit unless `force_refresh`; otherwise one deadline-bounded
    /// remote fetch (coalesced across concurrent readers) that populates
    /// the cache and mirror. On failure with `fallback_to_stale`, the
    /// last mirrored value is served tagged stale.
    pub async fn read(
        &self,
        resource_type: ResourceType,
        id: &str,
        options: ReadOptions,
    ) -> Result<CachedValue> {
        if !options.force_refresh {
            if let Some(value) = self.cache.get(resource_type, id, &[]) {
                return Ok(CachedValue {
                    value,
                    stale: false,
                });
            }
        }

        let key = CacheKey::simple(resource_type, id);
        match self.fetch_coalesced(resource_type, id, &key, options.timeout).await {
            Ok(value) => Ok(CachedValue {
                value,
                stale: false,
            }),
            Err(err) if options.fallback_to_stale => match self.load_mirrored(&key).await {
                Ok(Some(snapshot)) => {
                    debug!(key = %key, error = %err, "Remote failed, serving stale value");
                    Ok(CachedValue {
                        value: snapshot.value,
                        stale: true,
                    })
                }
                Ok(None) => Err(err),
                Err(corruption) => {
                    warn!(key = %key, error = %corruption, "Mirror snapshot unusable");
                    Err(err)
                }
            },
            Err(err) => Err(err),
        }
    }

    /// Write a resource.
    ///
    /// Commits to the cache and mirror before returning, guaranteeing
    /// read-your-writes; remote durability is eventual. Online immediate
    /// writes try one direct push and fall back to the queue on failure
    /// (authentication failures propagate instead).
    pub async fn write(
        &self,
        resource_type: ResourceType,
        id: &str,
        value: Value,
        options: WriteOptions,
    ) -> Result<()> {
        let key = self
            .cache
            .set(resource_type, id, &[], value.clone(), None);
        self.mirror_value(&key, value.clone()).await?;

        if options.sync_immediately && self.connectivity.is_online() {
            match self.remote.push(resource_type, id, &value).await {
                Ok(_) => {
                    debug!(key = %key, "Direct push succeeded");
                    *self.last_push_at.write().unwrap() = Some(self.clock.now());
                    return Ok(());
                }
                Err(Error::NotAuthenticated) => return Err(Error::NotAuthenticated),
                Err(err) => {
                    debug!(key = %key, error = %err, "Direct push failed, queueing write");
                }
            }
        }

        self.queue
            .enqueue(resource_type, id, value, options.priority)
            .await?;
        Ok(())
    }

    /// Remove one cached entry, or every entry of a type.
    ///
    /// For use after out-of-band server-confirmed mutations. Mirrored
    /// snapshots of the removed entries are dropped too, so the stale
    /// fallback cannot resurrect them.
    pub async fn invalidate(&self, resource_type: ResourceType, id: Option<&str>) -> Result<usize> {
        let mut removed = self.cache.invalidate(resource_type, id);

        if let Some(id) = id {
            // The in-memory entry may already be gone (expired, evicted);
            // the mirrored snapshot still has to go.
            let key = CacheKey::simple(resource_type, id).to_string();
            if !removed.contains(&key) {
                removed.push(key);
            }
        }

        for key in &removed {
            self.mirror
                .remove(&format!("{}{}", CACHE_MIRROR_PREFIX, key))
                .await?;
        }
        Ok(removed.len())
    }

    /// Remove every cached entry whose key matches the pattern.
    pub async fn invalidate_pattern(&self, pattern: &Regex) -> Result<usize> {
        let removed = self.cache.invalidate_pattern(pattern);
        for key in &removed {
            self.mirror
                .remove(&format!("{}{}", CACHE_MIRROR_PREFIX, key))
                .await?;
        }
        Ok(removed.len())
    }

    /// Live sync status for UI and observability.
    pub fn sync_status(&self) -> SyncStatus {
        let last_sync_at = [self.queue.last_sync_at(), *self.last_push_at.read().unwrap()]
            .into_iter()
            .flatten()
            .max();

        SyncStatus {
            is_online: self.connectivity.is_online(),
            in_progress: self.queue.is_draining(),
            queue_length: self.queue.len(),
            pending_operations: self.queue.pending_operations(),
            last_sync_at,
        }
    }

    /// Subscribe to sync and connectivity events. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Record a connectivity change from the platform layer.
    pub fn set_online(&self, online: bool) {
        self.connectivity.set_online(online);
    }

    /// Signal that the application regained foreground/visibility;
    /// drains the queue when online.
    pub async fn notify_foreground(&self) -> Result<DrainReport> {
        if self.connectivity.is_online() {
            self.queue.drain().await
        } else {
            Ok(DrainReport {
                remaining: self.queue.len(),
                skipped: true,
                ..DrainReport::default()
            })
        }
    }

    /// Register a custom delivery handler for one operation type.
    pub fn register_handler(&self, resource_type: ResourceType, handler: Arc<dyn SyncHandler>) {
        self.queue.register_handler(resource_type, handler);
    }

    /// Cache diagnostics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn fetch_coalesced(
        &self,
        resource_type: ResourceType,
        id: &str,
        key: &CacheKey,
        timeout: Option<std::time::Duration>,
    ) -> Result<Value> {
        let timeout = timeout.unwrap_or(self.config.read_timeout);

        let (fetch, leader) = {
            let mut pending = self.pending_reads.lock().unwrap();
            match pending.get(key.as_str()) {
                Some(fetch) => {
                    debug!(key = %key, "Joining in-flight fetch");
                    (fetch.clone(), false)
                }
                None => {
                    let remote = self.remote.clone();
                    let cache = self.cache.clone();
                    let mirror = self.mirror.clone();
                    let clock = self.clock.clone();
                    let id = id.to_string();
                    let mirror_key = format!("{}{}", CACHE_MIRROR_PREFIX, key);

                    let fetch = async move {
                        let value = tokio::time::timeout(timeout, remote.fetch(resource_type, &id))
                            .await
                            .map_err(|_| Error::NetworkTimeout)??;

                        cache.set(resource_type, &id, &[], value.clone(), None);
                        let snapshot = MirroredEntry::new(value.clone(), clock.now());
                        match serde_json::to_string(&snapshot) {
                            Ok(json) => {
                                if let Err(err) = mirror.set(&mirror_key, &json).await {
                                    warn!(key = %mirror_key, error = %err, "Failed to mirror fetched value");
                                }
                            }
                            Err(err) => {
                                warn!(key = %mirror_key, error = %err, "Failed to serialize snapshot");
                            }
                        }
                        Ok(value)
                    }
                    .boxed()
                    .shared();

                    pending.insert(key.to_string(), fetch.clone());
                    (fetch, true)
                }
            }
        };

        let result = fetch.await;
        if leader {
            self.pending_reads.lock().unwrap().remove(key.as_str());
        }
        result
    }

    /// Persist a locally committed value for stale fallback and restarts.
    async fn mirror_value(&self, key: &CacheKey, value: Value) -> Result<()> {
        let snapshot = MirroredEntry::new(value, self.clock.now());
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        self.mirror
            .set(&format!("{}{}", CACHE_MIRROR_PREFIX, key), &json)
            .await
    }

    /// Load the mirrored snapshot for a key.
    ///
    /// A snapshot that no longer parses is corruption: it is discarded
    /// and reported, and the key becomes a cold miss.
    async fn load_mirrored(&self, key: &CacheKey) -> Result<Option<MirroredEntry>> {
        let mirror_key = format!("{}{}", CACHE_MIRROR_PREFIX, key);
        let Some(raw) = self.mirror.get(&mirror_key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                let _ = self.mirror.remove(&mirror_key).await;
                Err(Error::CacheCorruption(format!(
                    "Discarded unparseable snapshot for '{}': {}",
                    key, err
                )))
            }
        }
    }

    async fn refresh_critical_keys(&self) {
        for key in &self.config.critical_keys {
            let options = ReadOptions {
                force_refresh: true,
                fallback_to_stale: false,
                timeout: None,
            };
            match self.read(key.resource_type, &key.id, options).await {
                Ok(_) => debug!(key = %key, "Refreshed critical key after reconnect"),
                Err(err) => warn!(key = %key, error = %err, "Critical key refresh failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coachsync_common::{ManualClock, ResourceKey};
    use coachsync_storage::{MemoryMirror, MemoryRemote};
    use serde_json::json;
    use std::time::Duration as StdDuration;

    struct Fixture {
        engine: Arc<DataOrchestrator>,
        remote: Arc<MemoryRemote>,
        mirror: Arc<MemoryMirror>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        fixture_with_config(EngineConfig::default())
    }

    fn fixture_with_config(config: EngineConfig) -> Fixture {
        let remote = Arc::new(MemoryRemote::new());
        let mirror = Arc::new(MemoryMirror::new());
        let clock = Arc::new(ManualClock::default());

        let engine = Arc::new(DataOrchestrator::with_clock(
            remote.clone(),
            mirror.clone(),
            config,
            clock.clone(),
        ));

        Fixture {
            engine,
            remote,
            mirror,
            clock,
        }
    }

    #[tokio::test]
    async fn test_read_populates_cache_then_hits() {
        let f = fixture();
        f.remote
            .insert(ResourceType::Profile, "u1", json!({"name": "Ana"}));

        let first = f
            .engine
            .read(ResourceType::Profile, "u1", ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(first.value["name"], "Ana");
        assert!(!first.stale);
        assert_eq!(f.remote.fetch_count(), 1);

        // Second read is a cache hit: no network
        f.engine
            .read(ResourceType::Profile, "u1", ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(f.remote.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let f = fixture();
        f.remote.insert(ResourceType::Profile, "u1", json!({"v": 1}));

        f.engine
            .read(ResourceType::Profile, "u1", ReadOptions::default())
            .await
            .unwrap();
        f.remote.insert(ResourceType::Profile, "u1", json!({"v": 2}));

        let refreshed = f
            .engine
            .read(
                ResourceType::Profile,
                "u1",
                ReadOptions {
                    force_refresh: true,
                    ..ReadOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(refreshed.value["v"], 2);
        assert_eq!(f.remote.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_read_your_writes_without_network() {
        let f = fixture();

        f.engine
            .write(
                ResourceType::Metrics,
                "u1",
                json!({"steps": 123}),
                WriteOptions::default(),
            )
            .await
            .unwrap();

        let read = f
            .engine
            .read(ResourceType::Metrics, "u1", ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(read.value["steps"], 123);
        assert!(!read.stale);
        assert_eq!(f.remote.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_writes_dedupe_and_flush_once() {
        let f = fixture();
        f.engine.set_online(false);

        f.engine
            .write(
                ResourceType::Metrics,
                "u1",
                json!({"steps": 100}),
                WriteOptions::default(),
            )
            .await
            .unwrap();
        f.engine
            .write(
                ResourceType::Metrics,
                "u1",
                json!({"steps": 150}),
                WriteOptions::default(),
            )
            .await
            .unwrap();

        let status = f.engine.sync_status();
        assert!(!status.is_online);
        assert_eq!(status.queue_length, 1);
        assert_eq!(status.pending_operations[0].payload["steps"], 150);
        assert_eq!(f.remote.push_count(), 0);

        // Reconnect and drain: exactly one remote call with the last payload
        f.engine.set_online(true);
        f.engine.notify_foreground().await.unwrap();

        assert_eq!(f.remote.push_count(), 1);
        assert_eq!(f.remote.pushes()[0].1["steps"], 150);
        assert_eq!(f.engine.sync_status().queue_length, 0);
    }

    #[tokio::test]
    async fn test_direct_push_failure_falls_back_to_queue() {
        let f = fixture();
        f.remote.set_failure(Some(Error::RemoteUnavailable { status: 503 }));

        f.engine
            .write(
                ResourceType::Nutrition,
                "u1",
                json!({"kcal": 2000}),
                WriteOptions::default(),
            )
            .await
            .unwrap();

        let status = f.engine.sync_status();
        assert_eq!(status.queue_length, 1);

        // Local commit held regardless
        let read = f
            .engine
            .read(ResourceType::Nutrition, "u1", ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(read.value["kcal"], 2000);
    }

    #[tokio::test]
    async fn test_auth_failure_propagates_from_write() {
        let f = fixture();
        f.remote.set_failure(Some(Error::NotAuthenticated));

        let result = f
            .engine
            .write(ResourceType::Profile, "u1", json!({}), WriteOptions::default())
            .await;
        assert!(matches!(result, Err(Error::NotAuthenticated)));

        // Nothing queued; re-authentication is required first
        assert_eq!(f.engine.sync_status().queue_length, 0);
    }

    #[tokio::test]
    async fn test_stale_fallback_serves_expired_mirror_copy() {
        let f = fixture();

        // Populate locally while healthy
        f.engine
            .write(
                ResourceType::Nutrition,
                "u2",
                json!({"kcal": 1800}),
                WriteOptions::default(),
            )
            .await
            .unwrap();

        // Entry expires, remote goes away
        f.clock.advance(chrono::Duration::hours(2));
        f.remote
            .set_failure(Some(Error::NetworkUnreachable("dns".into())));

        let options = ReadOptions {
            fallback_to_stale: true,
            ..ReadOptions::default()
        };
        let read = f
            .engine
            .read(ResourceType::Nutrition, "u2", options)
            .await
            .unwrap();
        assert!(read.stale);
        assert_eq!(read.value["kcal"], 1800);
    }

    #[tokio::test]
    async fn test_read_error_surfaces_without_fallback() {
        let f = fixture();
        f.remote
            .set_failure(Some(Error::NetworkUnreachable("dns".into())));

        let result = f
            .engine
            .read(ResourceType::Workouts, "u1", ReadOptions::default())
            .await;
        assert!(matches!(result, Err(Error::NetworkUnreachable(_))));
    }

    #[tokio::test]
    async fn test_corrupted_mirror_snapshot_is_discarded() {
        let f = fixture();
        f.mirror
            .set("cache/workouts:u1", "{definitely not json")
            .await
            .unwrap();
        f.remote
            .set_failure(Some(Error::NetworkUnreachable("dns".into())));

        let options = ReadOptions {
            fallback_to_stale: true,
            ..ReadOptions::default()
        };
        let result = f.engine.read(ResourceType::Workouts, "u1", options).await;

        // Corruption self-heals to a cold miss: the network error surfaces
        assert!(matches!(result, Err(Error::NetworkUnreachable(_))));
        assert_eq!(f.mirror.get("cache/workouts:u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_reads_coalesce_to_one_fetch() {
        let f = fixture();
        f.remote.insert(ResourceType::Chat, "c1", json!(["hi"]));
        f.remote.set_latency(Some(StdDuration::from_millis(50)));

        let (a, b) = tokio::join!(
            f.engine.read(ResourceType::Chat, "c1", ReadOptions::default()),
            f.engine.read(ResourceType::Chat, "c1", ReadOptions::default()),
        );

        assert_eq!(a.unwrap().value, b.unwrap().value);
        assert_eq!(f.remote.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_read_timeout_maps_to_network_timeout() {
        let f = fixture();
        f.remote.insert(ResourceType::Chat, "c1", json!([]));
        f.remote.set_latency(Some(StdDuration::from_millis(200)));

        let options = ReadOptions {
            timeout: Some(StdDuration::from_millis(20)),
            ..ReadOptions::default()
        };
        let result = f.engine.read(ResourceType::Chat, "c1", options).await;
        assert!(matches!(result, Err(Error::NetworkTimeout)));
    }

    #[tokio::test]
    async fn test_invalidate_drops_cache_and_mirror() {
        let f = fixture();
        f.engine
            .write(ResourceType::Profile, "u1", json!({"v": 1}), WriteOptions::default())
            .await
            .unwrap();

        let removed = f
            .engine
            .invalidate(ResourceType::Profile, Some("u1"))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        // With mirror and cache gone, a dead remote means a real error
        f.remote
            .set_failure(Some(Error::NetworkUnreachable("dns".into())));
        let options = ReadOptions {
            fallback_to_stale: true,
            ..ReadOptions::default()
        };
        let result = f.engine.read(ResourceType::Profile, "u1", options).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalidate_pattern_scopes_by_regex() {
        let f = fixture();
        f.engine
            .write(ResourceType::Metrics, "u1", json!(1), WriteOptions::default())
            .await
            .unwrap();
        f.engine
            .write(ResourceType::Profile, "u1", json!(2), WriteOptions::default())
            .await
            .unwrap();
        f.engine
            .write(ResourceType::Metrics, "u2", json!(3), WriteOptions::default())
            .await
            .unwrap();

        let pattern = Regex::new("^metrics:").unwrap();
        let removed = f.engine.invalidate_pattern(&pattern).await.unwrap();
        assert_eq!(removed, 2);

        // Untouched family still readable from cache
        assert_eq!(f.remote.fetch_count(), 0);
        f.engine
            .read(ResourceType::Profile, "u1", ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(f.remote.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_terminal_rejection_emits_failure_event() {
        let f = fixture();
        let mut events = f.engine.subscribe();
        f.engine.set_online(false);

        f.engine
            .write(ResourceType::Profile, "u1", json!({"bad": true}), WriteOptions::default())
            .await
            .unwrap();

        f.engine.set_online(true);
        f.remote.set_failure(Some(Error::RemoteRejected {
            status: 422,
            message: "validation".into(),
        }));
        f.engine.notify_foreground().await.unwrap();

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let SyncEvent::OperationFailed { operation } = event {
                assert_eq!(operation.resource_id, "u1");
                saw_failure = true;
            }
        }
        assert!(saw_failure);
        assert_eq!(f.engine.sync_status().queue_length, 0);

        // The optimistic local value is not rolled back
        let read = f
            .engine
            .read(ResourceType::Profile, "u1", ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(read.value["bad"], true);
    }

    #[tokio::test]
    async fn test_sync_status_tracks_drains() {
        let f = fixture();
        assert!(f.engine.sync_status().last_sync_at.is_none());

        f.engine.set_online(false);
        f.engine
            .write(ResourceType::Chat, "c1", json!("hey"), WriteOptions::default())
            .await
            .unwrap();
        f.engine.set_online(true);
        f.engine.notify_foreground().await.unwrap();

        let status = f.engine.sync_status();
        assert!(status.last_sync_at.is_some());
        assert_eq!(status.queue_length, 0);
        assert!(!status.in_progress);
    }

    #[tokio::test]
    async fn test_critical_keys_refresh_on_reconnect() {
        let config = EngineConfig::default()
            .with_drain_interval(StdDuration::from_secs(3600))
            .with_critical_keys(vec![
                ResourceKey::new(ResourceType::Profile, "me").unwrap()
            ]);
        let f = fixture_with_config(config);
        f.remote.insert(ResourceType::Profile, "me", json!({"name": "Ana"}));

        f.engine.clone().start().await.unwrap();
        f.engine.set_online(false);
        // Let the runtime observe the offline state before reconnecting;
        // the watch channel only carries the latest value.
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        f.engine.set_online(true);

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(f.remote.fetch_count(), 1);

        // The refresh populated the cache
        f.engine
            .read(ResourceType::Profile, "me", ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(f.remote.fetch_count(), 1);

        f.engine.stop();
    }

    #[tokio::test]
    async fn test_queue_restored_on_start() {
        let f = fixture();
        f.engine.set_online(false);
        f.engine
            .write(ResourceType::Metrics, "u1", json!({"steps": 9}), WriteOptions::default())
            .await
            .unwrap();

        // A fresh engine over the same mirror resumes the pending set
        let restarted = Arc::new(DataOrchestrator::with_clock(
            f.remote.clone(),
            f.mirror.clone(),
            EngineConfig::default().with_drain_interval(StdDuration::from_secs(3600)),
            f.clock.clone(),
        ));
        restarted.clone().start().await.unwrap();

        let status = restarted.sync_status();
        assert_eq!(status.queue_length, 1);
        assert_eq!(status.pending_operations[0].payload["steps"], 9);
        restarted.stop();
    }
}
