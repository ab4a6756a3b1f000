//! In-memory key-value store.

use super::{KeyValueStore, StoreError};
use async_trait::async_trait;
use cloudmsg_core::StoreKey;
use dashmap::DashMap;

/// Key-value store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<StoreKey, Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys holding a value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: StoreKey) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.values.get(&key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: StoreKey, value: Vec<u8>) -> Result<(), StoreError> {
        self.values.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        self.values.remove(&key);
        Ok(())
    }
}
