use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use super::record::CacheRecord;

/// Failure reported by a durable backing store.
#[derive(Error, Debug, Clone)]
pub enum CacheStoreError {
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),

    #[error("Backing store operation failed: {0}")]
    Operation(String),
}

/// Optional durable layer behind the in-memory result cache.
#[async_trait]
pub trait CacheBackingStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheStoreError>;

    async fn put(&self, record: CacheRecord) -> Result<(), CacheStoreError>;

    async fn remove(&self, key: &str) -> Result<(), CacheStoreError>;
}

/// Backing store held in a concurrent map.
///
/// Lets several engines in one process share records.
#[derive(Debug, Default)]
pub struct SharedMapStore {
    records: DashMap<String, CacheRecord>,
}

impl SharedMapStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CacheBackingStore for SharedMapStore {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheStoreError> {
        Ok(self.records.get(key).map(|record| record.clone()))
    }

    async fn put(&self, record: CacheRecord) -> Result<(), CacheStoreError> {
        self.records.insert(record.key.clone(), record);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheStoreError> {
        self.records.remove(key);
        Ok(())
    }
}
