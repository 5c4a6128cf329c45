//! Remote backend trait definition.

use async_trait::async_trait;
use serde_json::Value;

use coachsync_common::{ResourceType, Result};

/// Wire contract of the coaching backend.
///
/// One logical JSON endpoint per resource type: `GET /{type}/{id}` returns
/// the resource body, `PUT /{type}/{id}` submits a JSON payload and returns
/// an acknowledgement body. Implementations map transport failures onto the
/// common error taxonomy:
///
/// - request timeout → [`Error::NetworkTimeout`](coachsync_common::Error::NetworkTimeout)
/// - unreachable host → [`Error::NetworkUnreachable`](coachsync_common::Error::NetworkUnreachable)
/// - 401/403 → [`Error::NotAuthenticated`](coachsync_common::Error::NotAuthenticated)
/// - other 4xx → [`Error::RemoteRejected`](coachsync_common::Error::RemoteRejected)
/// - 5xx → [`Error::RemoteUnavailable`](coachsync_common::Error::RemoteUnavailable)
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetch a resource body.
    async fn fetch(&self, resource_type: ResourceType, id: &str) -> Result<Value>;

    /// Submit a resource payload, returning the acknowledgement body.
    ///
    /// Must be idempotent per (type, id, payload): the sync queue gives
    /// at-least-once delivery, and a crash between remote success and
    /// local removal replays the push.
    async fn push(&self, resource_type: ResourceType, id: &str, payload: &Value) -> Result<Value>;
}
