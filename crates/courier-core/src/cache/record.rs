use serde::{Deserialize, Serialize};

/// A cached response keyed by its canonical request key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: String,
    /// Serialized response text.
    pub value: String,
    /// Time of the most recent store, in epoch milliseconds.
    pub stored_at_millis: u64,
    /// Time of the first store under this key, in epoch milliseconds.
    pub first_stored_at_millis: u64,
}

impl CacheRecord {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>, now_millis: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            stored_at_millis: now_millis,
            first_stored_at_millis: now_millis,
        }
    }

    /// Milliseconds since the last store, saturating at zero for clock skew.
    #[must_use]
    pub fn age_millis(&self, now_millis: u64) -> u64 {
        now_millis.saturating_sub(self.stored_at_millis)
    }

    /// A record is fresh while its age is strictly below the renewal window.
    #[must_use]
    pub fn is_fresh_at(&self, now_millis: u64, renewal_window_ms: u64) -> bool {
        self.age_millis(now_millis) < renewal_window_ms
    }

    /// Records with an empty value are treated as absent.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.value.is_empty()
    }

    /// Replaces the value and refreshes the store time, keeping the first store time.
    pub fn refresh(&mut self, value: String, now_millis: u64) {
        self.value = value;
        self.stored_at_millis = now_millis;
    }
}
