//! Per-resource-type TTL policy.

use chrono::Duration;
use std::collections::HashMap;

use coachsync_common::ResourceType;

/// Default TTLs per resource family, in seconds.
///
/// Chat moves fastest, anamnese is near-static intake data; the default
/// covers resource types without a named entry.
const TTL_PROFILE_SECS: i64 = 60 * 60;
const TTL_METRICS_SECS: i64 = 5 * 60;
const TTL_WORKOUTS_SECS: i64 = 30 * 60;
const TTL_NUTRITION_SECS: i64 = 30 * 60;
const TTL_CHAT_SECS: i64 = 60;
const TTL_ANAMNESE_SECS: i64 = 24 * 60 * 60;
const TTL_DEFAULT_SECS: i64 = 10 * 60;

/// TTL policy table with a default fallback.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    ttls: HashMap<ResourceType, Duration>,
    default_ttl: Duration,
}

impl TtlPolicy {
    /// Resolve the TTL for a resource type.
    ///
    /// Types without a named entry use the default TTL.
    pub fn ttl_for(&self, resource_type: ResourceType) -> Duration {
        self.ttls
            .get(&resource_type)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// Override the TTL for one resource type.
    pub fn with_ttl(mut self, resource_type: ResourceType, ttl: Duration) -> Self {
        self.ttls.insert(resource_type, ttl);
        self
    }

    /// Override the fallback TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Policy with no named entries: every type uses the given TTL.
    pub fn uniform(ttl: Duration) -> Self {
        Self {
            ttls: HashMap::new(),
            default_ttl: ttl,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        let mut ttls = HashMap::new();
        ttls.insert(ResourceType::Profile, Duration::seconds(TTL_PROFILE_SECS));
        ttls.insert(ResourceType::Metrics, Duration::seconds(TTL_METRICS_SECS));
        ttls.insert(ResourceType::Workouts, Duration::seconds(TTL_WORKOUTS_SECS));
        ttls.insert(
            ResourceType::Nutrition,
            Duration::seconds(TTL_NUTRITION_SECS),
        );
        ttls.insert(ResourceType::Chat, Duration::seconds(TTL_CHAT_SECS));
        ttls.insert(ResourceType::Anamnese, Duration::seconds(TTL_ANAMNESE_SECS));

        Self {
            ttls,
            default_ttl: Duration::seconds(TTL_DEFAULT_SECS),
        }
    }
}
