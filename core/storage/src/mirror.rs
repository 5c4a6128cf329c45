//! Durable key/value mirror trait.

use async_trait::async_trait;

use coachsync_common::Result;

/// Durable key→string persistence surviving process restarts.
///
/// Values are JSON-serialized snapshots (cache entries, the sync queue).
/// Implementations must make `set` durable before returning: a mirrored
/// mutation is the crash-survivability boundary for the sync queue.
#[async_trait]
pub trait LocalMirror: Send + Sync {
    /// Read a value. Missing keys are `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any existing one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing a missing key is a no-op.
    async fn remove(&self, key: &str) -> Result<()>;
}
