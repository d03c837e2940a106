use dashmap::DashMap;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::{record::CacheRecord, store::CacheBackingStore};
use crate::{
    clock::{Clock, SystemClock},
    config::CacheConfig,
    executor::{TaskExecutor, TokioExecutor},
};

/// Request-key to response cache with a renewal window.
///
/// Expiration is lazy: stale records are evicted when a lookup finds them.
/// Writes go through [`ResultCache::store_async`] and never block the caller.
#[derive(Clone, Debug)]
pub struct ResultCache {
    records: Arc<DashMap<String, CacheRecord>>,
    backing: Option<Arc<dyn CacheBackingStore>>,
    clock: Arc<dyn Clock>,
    executor: Arc<dyn TaskExecutor>,
    renewal_window_ms: u64,
    max_entries: usize,
    in_memory: bool,
    overwrite: bool,
}

impl ResultCache {
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            backing: None,
            clock: Arc::new(SystemClock),
            executor: Arc::new(TokioExecutor::new()),
            renewal_window_ms: config.renewal_window_ms,
            max_entries: config.max_entries.max(1),
            in_memory: config.in_memory,
            overwrite: config.overwrite,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = executor;
        self
    }

    #[must_use]
    pub fn with_backing_store(mut self, store: Arc<dyn CacheBackingStore>) -> Self {
        self.backing = Some(store);
        self
    }

    /// Returns `true` when neither memory nor a backing store is configured.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        !self.in_memory && self.backing.is_none()
    }

    /// Number of records held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `now - stored_at < renewal_window`.
    #[must_use]
    pub fn is_fresh(&self, record: &CacheRecord) -> bool {
        record.is_fresh_at(self.clock.now_millis(), self.renewal_window_ms)
    }

    /// Looks up a fresh record for `key`.
    ///
    /// Stale or empty memory records are evicted. On a memory miss the backing
    /// store is consulted: fresh durable records are promoted into memory and
    /// stale ones are removed. Backing store failures count as a miss.
    pub async fn lookup(&self, key: &str) -> Option<CacheRecord> {
        let now = self.clock.now_millis();

        if self.in_memory {
            if let Some(record) = self.records.get(key).map(|entry| entry.clone()) {
                if record.is_usable() && record.is_fresh_at(now, self.renewal_window_ms) {
                    trace!(key = %key, age_ms = record.age_millis(now), "cache hit");
                    return Some(record);
                }

                let stored_at = record.stored_at_millis;
                if self.records.remove_if(key, |_, r| r.stored_at_millis == stored_at).is_some() {
                    debug!(
                        key = %key,
                        age_ms = record.age_millis(now),
                        "evicted stale cache record"
                    );
                }
            }
        }

        let store = self.backing.as_ref()?;
        match store.get(key).await {
            Ok(Some(record)) if !record.is_usable() => None,
            Ok(Some(record)) if record.is_fresh_at(now, self.renewal_window_ms) => {
                trace!(key = %key, "durable cache hit");
                if self.in_memory {
                    self.records.insert(key.to_string(), record.clone());
                    self.enforce_capacity(key);
                }
                Some(record)
            }
            Ok(Some(_)) => {
                debug!(key = %key, "removing stale durable cache record");
                if let Err(e) = store.remove(key).await {
                    warn!(key = %key, error = %e, "failed to remove stale durable cache record");
                }
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "backing store lookup failed, treating as miss");
                None
            }
        }
    }

    /// Submits a write to the background executor and returns immediately.
    pub fn store_async(&self, key: impl Into<String>, value: impl Into<String>) {
        if self.is_disabled() {
            return;
        }

        let key = key.into();
        let value = value.into();
        trace!(key = %key, bytes = value.len(), "scheduling cache write");

        let cache = self.clone();
        self.executor.submit(
            async move {
                cache.store(&key, value).await;
            }
            .boxed(),
        );
    }

    /// Writes `value` under `key`, refreshing the store time.
    ///
    /// The first store time of an existing record is preserved. Failures are logged.
    pub async fn store(&self, key: &str, value: String) {
        if value.is_empty() {
            trace!(key = %key, "skipping empty cache value");
            return;
        }

        let now = self.clock.now_millis();
        let mut record = CacheRecord::new(key, value, now);

        if self.in_memory {
            let stored = self
                .records
                .entry(key.to_string())
                .and_modify(|existing| existing.refresh(record.value.clone(), now))
                .or_insert_with(|| record.clone())
                .clone();
            record = stored;
            self.enforce_capacity(key);
            trace!(key = %key, "cache record stored in memory");
        }

        let Some(store) = self.backing.as_ref() else {
            return;
        };

        if !self.overwrite || !self.in_memory {
            match store.get(key).await {
                Ok(Some(existing)) if existing.is_usable() => {
                    if !self.overwrite && existing.is_fresh_at(now, self.renewal_window_ms) {
                        trace!(key = %key, "keeping existing durable cache record");
                        return;
                    }
                    record.first_stored_at_millis =
                        record.first_stored_at_millis.min(existing.first_stored_at_millis);
                }
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "backing store read before write failed"),
            }
        }

        if let Err(e) = store.put(record).await {
            warn!(key = %key, error = %e, "failed to write durable cache record");
        }
    }

    /// Evicts the record with the oldest store time while over capacity.
    fn enforce_capacity(&self, keep: &str) {
        while self.records.len() > self.max_entries {
            let oldest = self
                .records
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| entry.stored_at_millis)
                .map(|entry| entry.key().clone());

            match oldest {
                Some(key) => {
                    self.records.remove(&key);
                    debug!(key = %key, "evicted oldest cache record at capacity");
                }
                None => break,
            }
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
