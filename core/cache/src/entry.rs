//! Cache entry types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single cached value with its expiry and access bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Canonical cache key this entry is stored under.
    pub key: String,
    /// Opaque resource payload.
    pub value: Value,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// When the entry stops being served. Always after `created_at`.
    pub expires_at: DateTime<Utc>,
    /// Number of successful reads.
    pub access_count: u64,
    /// Time of the most recent read (creation time until then).
    pub last_accessed_at: DateTime<Utc>,
    /// Rough payload size, captured once at insert.
    pub size_bytes: usize,
}

impl CacheEntry {
    /// Create an entry expiring `ttl` after `now`.
    pub fn new(key: String, value: Value, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = ttl.max(Duration::milliseconds(1));
        let size_bytes = key.len() + estimate_size(&value);

        Self {
            key,
            value,
            created_at: now,
            expires_at: now + ttl,
            access_count: 0,
            last_accessed_at: now,
            size_bytes,
        }
    }

    /// Whether the entry has passed its expiry boundary.
    ///
    /// An entry is served strictly before `expires_at` and is a miss at
    /// and after it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Record a successful read.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }
}

/// Durable snapshot of a cached value, written to the LocalMirror on
/// every populate and local write.
///
/// Outlives the in-memory entry: stale-fallback reads and cold starts
/// are served from here after expiry or restart has dropped the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirroredEntry {
    pub value: Value,
    pub cached_at: DateTime<Utc>,
}

impl MirroredEntry {
    pub fn new(value: Value, cached_at: DateTime<Utc>) -> Self {
        Self { value, cached_at }
    }
}

/// Rough in-memory size of a JSON value.
fn estimate_size(value: &Value) -> usize {
    match value {
        Value::Null => 4,
        Value::Bool(_) => 5,
        Value::Number(_) => 8,
        Value::String(s) => s.len() + 8,
        Value::Array(items) => items.iter().map(estimate_size).sum::<usize>() + 8,
        Value::Object(map) => {
            map.iter()
                .map(|(k, v)| k.len() + estimate_size(v))
                .sum::<usize>()
                + 8
        }
    }
}
