//! Common types used throughout CoachSync.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource families served by the coaching backend.
///
/// Each family maps to one logical remote endpoint and one TTL policy
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Profile,
    Metrics,
    Workouts,
    Nutrition,
    Chat,
    Anamnese,
}

impl ResourceType {
    /// All resource families, in declaration order.
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Profile,
        ResourceType::Metrics,
        ResourceType::Workouts,
        ResourceType::Nutrition,
        ResourceType::Chat,
        ResourceType::Anamnese,
    ];

    /// Wire/string form of the resource type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Profile => "profile",
            ResourceType::Metrics => "metrics",
            ResourceType::Workouts => "workouts",
            ResourceType::Nutrition => "nutrition",
            ResourceType::Chat => "chat",
            ResourceType::Anamnese => "anamnese",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "profile" => Ok(ResourceType::Profile),
            "metrics" => Ok(ResourceType::Metrics),
            "workouts" => Ok(ResourceType::Workouts),
            "nutrition" => Ok(ResourceType::Nutrition),
            "chat" => Ok(ResourceType::Chat),
            "anamnese" => Ok(ResourceType::Anamnese),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown resource type: {}",
                other
            ))),
        }
    }
}

/// Identifies one remote resource: a (type, identifier) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub resource_type: ResourceType,
    pub id: String,
}

impl ResourceKey {
    /// Create a new resource key.
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(resource_type: ResourceType, id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Resource id cannot be empty".to_string(),
            ));
        }
        Ok(Self { resource_type, id })
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

/// Canonical cache key derived from (type, identifier, query params).
///
/// The key is a deterministic string, `"{type}:{id}"` with a sorted
/// `?k=v&k2=v2` suffix when params are present. Readable keys make
/// pattern invalidation and mirror file names straightforward.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from a resource type, identifier, and query params.
    ///
    /// Params are sorted by name so equivalent queries produce the same
    /// key regardless of argument order.
    pub fn new(resource_type: ResourceType, id: &str, params: &[(&str, &str)]) -> Self {
        if params.is_empty() {
            return Self(format!("{}:{}", resource_type, id));
        }

        let mut sorted: Vec<(&str, &str)> = params.to_vec();
        sorted.sort_unstable();

        let query: Vec<String> = sorted.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        Self(format!("{}:{}?{}", resource_type, id, query.join("&")))
    }

    /// Build a key with no query params.
    pub fn simple(resource_type: ResourceType, id: &str) -> Self {
        Self::new(resource_type, id, &[])
    }

    /// Prefix shared by every key of a resource type.
    pub fn type_prefix(resource_type: ResourceType) -> String {
        format!("{}:", resource_type)
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
