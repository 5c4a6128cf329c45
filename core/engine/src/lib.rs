//! CoachSync data engine.
//!
//! The public facade over the offline-first machinery: reads go through
//! the TTL cache and fall back to mirrored snapshots when the network is
//! down; writes commit locally first and reach the remote directly or
//! through the durable sync queue. One engine instance is constructed by
//! the application root and injected where data access is needed.

pub mod config;
pub mod orchestrator;

pub use config::EngineConfig;
pub use orchestrator::{CachedValue, DataOrchestrator, ReadOptions, SyncStatus, WriteOptions};
