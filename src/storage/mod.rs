//! Durable key-value storage.
//!
//! # Data Flow
//! ```text
//! CircuitBreaker / RateLimiter / ReliabilityTracker
//!     → keys.rs (prefix + escaped provider id)
//!     → Store::read / Store::write / Store::delete
//!         - memory.rs (process-local, tests and dry runs)
//!         - file.rs (one JSON file per key, shared across restarts)
//! ```
//!
//! # Design Decisions
//! - Values are opaque strings; every record is JSON-encoded by its owner
//! - The store is the single source of truth; callers read fresh on every op
//! - No cross-key transactions; per-key serialization lives in resilience::lock

pub mod file;
pub mod keys;
pub mod memory;

use async_trait::async_trait;

use crate::error::StoreResult;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Async string key-value store.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Read a value, `None` if the key is absent.
    async fn read(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn write(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Decode a persisted JSON record, treating corrupt data as absent.
pub(crate) fn decode_or_default<T>(key: &str, raw: Option<String>) -> Option<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Discarding malformed persisted record");
            None
        }
    }
}

/// Encode a record for persistence.
pub(crate) fn encode<T: serde::Serialize>(key: &str, value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|source| crate::error::StoreError::Serialize {
        key: key.to_string(),
        source,
    })
}
