//! In-memory mirror and remote for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use coachsync_common::{Error, ResourceType, Result};

use crate::mirror::LocalMirror;
use crate::remote::RemoteApi;

/// In-memory mirror.
///
/// Useful for testing and development. All data is lost on drop.
#[derive(Default)]
pub struct MemoryMirror {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryMirror {
    /// Create a new empty memory mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the mirror is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

#[async_trait]
impl LocalMirror for MemoryMirror {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }
}

/// In-memory remote backend.
///
/// Serves objects from a map and records every call, with an injectable
/// failure mode and optional latency for coalescing and single-flight
/// tests.
#[derive(Default)]
pub struct MemoryRemote {
    objects: RwLock<HashMap<String, Value>>,
    fail_with: RwLock<Option<Error>>,
    latency: RwLock<Option<Duration>>,
    fetch_calls: AtomicU32,
    push_calls: AtomicU32,
    push_log: Mutex<Vec<(String, Value)>>,
}

impl MemoryRemote {
    /// Create a new empty memory remote.
    pub fn new() -> Self {
        Self::default()
    }

    fn object_key(resource_type: ResourceType, id: &str) -> String {
        format!("{}:{}", resource_type, id)
    }

    /// Seed a resource body.
    pub fn insert(&self, resource_type: ResourceType, id: &str, value: Value) {
        self.objects
            .write()
            .unwrap()
            .insert(Self::object_key(resource_type, id), value);
    }

    /// Make every subsequent call fail with the given error, or succeed
    /// again when `None`.
    pub fn set_failure(&self, error: Option<Error>) {
        *self.fail_with.write().unwrap() = error;
    }

    /// Add artificial latency to every call.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().unwrap() = latency;
    }

    /// Number of fetch calls seen.
    pub fn fetch_count(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of push calls seen.
    pub fn push_count(&self) -> u32 {
        self.push_calls.load(Ordering::SeqCst)
    }

    /// Every push seen, in order, as (object key, payload).
    pub fn pushes(&self) -> Vec<(String, Value)> {
        self.push_log.lock().unwrap().clone()
    }

    async fn simulate(&self) -> Result<()> {
        let latency = *self.latency.read().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = self.fail_with.read().unwrap().clone() {
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for MemoryRemote {
    async fn fetch(&self, resource_type: ResourceType, id: &str) -> Result<Value> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;

        self.objects
            .read()
            .unwrap()
            .get(&Self::object_key(resource_type, id))
            .cloned()
            .ok_or_else(|| Error::RemoteRejected {
                status: 404,
                message: format!("No such resource: {}:{}", resource_type, id),
            })
    }

    async fn push(&self, resource_type: ResourceType, id: &str, payload: &Value) -> Result<Value> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate().await?;

        let key = Self::object_key(resource_type, id);
        self.objects
            .write()
            .unwrap()
            .insert(key.clone(), payload.clone());
        self.push_log.lock().unwrap().push((key, payload.clone()));

        Ok(serde_json::json!({ "ok": true }))
    }
}
