//! Engine configuration.

use std::time::Duration;

use coachsync_cache::TtlPolicy;
use coachsync_common::ResourceKey;

/// Number of delivery attempts before a queued write fails terminally.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base unit of the retry backoff (`base * attempts`).
const DEFAULT_BACKOFF_BASE_SECS: u64 = 2;

/// How often the queue drains while online.
const DEFAULT_DRAIN_INTERVAL_SECS: u64 = 30;

/// How often expired cache entries are swept.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Deadline for a remote read before the stale-fallback path takes over.
const DEFAULT_READ_TIMEOUT_SECS: u64 = 10;

/// Resident cache entry cap.
const DEFAULT_MAX_CACHE_ENTRIES: usize = 4096;

/// Static engine configuration.
///
/// Fixed at construction; none of these are runtime-mutable flags.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-resource-type TTL table.
    pub ttl_policy: TtlPolicy,
    /// Queue retry bound.
    pub max_retries: u32,
    /// Queue backoff base delay.
    pub backoff_base: Duration,
    /// Periodic drain interval.
    pub drain_interval: Duration,
    /// Periodic cache sweep interval.
    pub sweep_interval: Duration,
    /// Default remote read deadline.
    pub read_timeout: Duration,
    /// Cache entry cap.
    pub max_cache_entries: usize,
    /// Keys force-refreshed after every reconnect, to cut staleness for
    /// the data the UI shows first. Keep this list small.
    pub critical_keys: Vec<ResourceKey>,
}

impl EngineConfig {
    pub fn with_ttl_policy(mut self, policy: TtlPolicy) -> Self {
        self.ttl_policy = policy;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_max_cache_entries(mut self, max_entries: usize) -> Self {
        self.max_cache_entries = max_entries;
        self
    }

    pub fn with_critical_keys(mut self, keys: Vec<ResourceKey>) -> Self {
        self.critical_keys = keys;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ttl_policy: TtlPolicy::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_secs(DEFAULT_BACKOFF_BASE_SECS),
            drain_interval: Duration::from_secs(DEFAULT_DRAIN_INTERVAL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            max_cache_entries: DEFAULT_MAX_CACHE_ENTRIES,
            critical_keys: Vec::new(),
        }
    }
}
