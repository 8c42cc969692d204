//! In-process store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::StoreResult;
use crate::storage::Store;

/// Store backed by a concurrent map. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.inner.get(key).map(|r| r.value().clone()))
    }

    async fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_operations() {
        let store = MemoryStore::new();
        assert!(store.read("k").await.unwrap().is_none());

        store.write("k", "v1").await.unwrap();
        store.write("k", "v2").await.unwrap();
        assert_eq!(store.read("k").await.unwrap().as_deref(), Some("v2"));

        let shared = store.clone();
        shared.delete("k").await.unwrap();
        assert!(store.is_empty());

        // Deleting again is a no-op.
        store.delete("k").await.unwrap();
    }
}
