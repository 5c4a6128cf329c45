//! TTL-keyed read cache with per-resource-type policies.

use chrono::Duration;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use coachsync_common::{CacheKey, Clock, ResourceType};

use crate::entry::CacheEntry;
use crate::policy::TtlPolicy;

/// Hard cap on resident entries. TTL sweep alone does not bound memory
/// when many distinct keys are written and never re-read.
const DEFAULT_MAX_ENTRIES: usize = 4096;

/// In-memory read cache.
///
/// Pure and non-throwing: every operation completes without raising
/// errors to callers. Expired entries are removed lazily on read and in
/// bulk by [`sweep`](CacheStore::sweep).
pub struct CacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    policy: TtlPolicy,
    clock: Arc<dyn Clock>,
    max_entries: usize,
}

impl CacheStore {
    /// Create a store with the given policy table and clock.
    pub fn new(policy: TtlPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            policy,
            clock,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Override the resident-entry cap.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Look up a fresh value.
    ///
    /// A hit updates the entry's access stats. An expired entry is
    /// removed and reported as a miss.
    pub fn get(&self, resource_type: ResourceType, id: &str, params: &[(&str, &str)]) -> Option<Value> {
        let key = CacheKey::new(resource_type, id, params);
        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap();

        match entries.get_mut(key.as_str()) {
            Some(entry) if entry.is_expired(now) => {
                debug!(key = %key, "Cache entry expired, removing");
                entries.remove(key.as_str());
                None
            }
            Some(entry) => {
                entry.touch(now);
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    /// Store a value. Never fails.
    ///
    /// The TTL comes from the policy table unless overridden. Inserting
    /// a new key at the cap evicts the least-recently-accessed entry.
    pub fn set(
        &self,
        resource_type: ResourceType,
        id: &str,
        params: &[(&str, &str)],
        value: Value,
        ttl_override: Option<Duration>,
    ) -> CacheKey {
        let key = CacheKey::new(resource_type, id, params);
        let ttl = ttl_override.unwrap_or_else(|| self.policy.ttl_for(resource_type));
        let now = self.clock.now();
        let entry = CacheEntry::new(key.to_string(), value, now, ttl);

        let mut entries = self.entries.write().unwrap();
        if !entries.contains_key(key.as_str()) && entries.len() >= self.max_entries {
            Self::evict_coldest(&mut entries);
        }
        entries.insert(key.to_string(), entry);
        key
    }

    /// Remove one entry, or every entry of a type when `id` is omitted.
    ///
    /// Returns the removed keys so the caller can drop durable snapshots
    /// alongside.
    pub fn invalidate(&self, resource_type: ResourceType, id: Option<&str>) -> Vec<String> {
        let mut entries = self.entries.write().unwrap();

        let removed: Vec<String> = match id {
            Some(id) => {
                let key = CacheKey::simple(resource_type, id);
                // Params-scoped entries of the same resource share the
                // "type:id?" prefix and go with it.
                let query_prefix = format!("{}?", key);
                entries
                    .keys()
                    .filter(|k| *k == key.as_str() || k.starts_with(&query_prefix))
                    .cloned()
                    .collect()
            }
            None => {
                let prefix = CacheKey::type_prefix(resource_type);
                entries
                    .keys()
                    .filter(|k| k.starts_with(&prefix))
                    .cloned()
                    .collect()
            }
        };

        for key in &removed {
            entries.remove(key);
        }
        removed
    }

    /// Remove every entry whose key matches the pattern.
    ///
    /// Used for cross-cutting invalidation, e.g. dropping all user data
    /// at logout.
    pub fn invalidate_pattern(&self, pattern: &Regex) -> Vec<String> {
        let mut entries = self.entries.write().unwrap();
        let removed: Vec<String> = entries
            .keys()
            .filter(|k| pattern.is_match(k))
            .cloned()
            .collect();

        for key in &removed {
            entries.remove(key);
        }
        removed
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    /// Remove every expired entry. Returns the number removed.
    ///
    /// Runs on a fixed interval independent of reads, bounding memory
    /// growth from keys that are never re-read.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Cache sweep removed expired entries");
        }
        removed
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Read-only diagnostics. Never used for control flow.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap();
        let mut per_type: HashMap<ResourceType, TypeStats> = HashMap::new();

        for resource_type in ResourceType::ALL {
            let prefix = CacheKey::type_prefix(resource_type);
            let mut stats = TypeStats::default();
            for entry in entries.values().filter(|e| e.key.starts_with(&prefix)) {
                stats.entries += 1;
                stats.total_accesses += entry.access_count;
            }
            if stats.entries > 0 {
                per_type.insert(resource_type, stats);
            }
        }

        CacheStats {
            entries: entries.len(),
            approx_bytes: entries.values().map(|e| e.size_bytes).sum(),
            per_type,
        }
    }

    fn evict_coldest(entries: &mut HashMap<String, CacheEntry>) {
        let coldest = entries
            .values()
            .min_by_key(|e| e.last_accessed_at)
            .map(|e| e.key.clone());
        if let Some(key) = coldest {
            debug!(key = %key, "Cache at capacity, evicting least-recently-accessed entry");
            entries.remove(&key);
        }
    }
}

/// Aggregate diagnostics for the store.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub approx_bytes: usize,
    pub per_type: HashMap<ResourceType, TypeStats>,
}

/// Per-resource-type diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeStats {
    pub entries: usize,
    pub total_accesses: u64,
}
