//! Per-host request pacing.
//!
//! Successive requests to the same host are spaced by at least a minimum
//! interval. Each host has its own gate, so a sleeping caller only ever delays
//! callers for the same host.

use dashmap::DashMap;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::Mutex, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{config::ThrottleConfig, errors::Cancelled};

/// Gate for one host. The guarded value is the time of the last admitted request.
#[derive(Debug, Default)]
struct ThrottleEntry {
    last_request: Mutex<Option<Instant>>,
}

/// Bounded table of per-host throttle entries.
#[derive(Debug)]
pub struct HostThrottle {
    entries: DashMap<String, Arc<ThrottleEntry>>,
    min_interval: Duration,
    host_intervals: HashMap<String, Duration>,
    max_tracked_hosts: usize,
}

impl HostThrottle {
    #[must_use]
    pub fn new(min_interval: Duration, max_tracked_hosts: usize) -> Self {
        Self {
            entries: DashMap::new(),
            min_interval,
            host_intervals: HashMap::new(),
            max_tracked_hosts: max_tracked_hosts.max(1),
        }
    }

    #[must_use]
    pub fn from_config(config: &ThrottleConfig) -> Self {
        let mut throttle = Self::new(config.min_interval(), config.max_tracked_hosts);
        throttle.host_intervals = config
            .host_intervals
            .iter()
            .map(|(host, ms)| (host.to_ascii_lowercase(), Duration::from_millis(*ms)))
            .collect();
        throttle
    }

    /// Overrides the minimum interval for one host.
    #[must_use]
    pub fn with_host_interval(mut self, host: &str, interval: Duration) -> Self {
        self.host_intervals.insert(host.to_ascii_lowercase(), interval);
        self
    }

    /// Effective spacing for `host`.
    #[must_use]
    pub fn interval_for(&self, host: &str) -> Duration {
        self.host_intervals.get(&host.to_ascii_lowercase()).copied().unwrap_or(self.min_interval)
    }

    /// Number of hosts currently tracked.
    #[must_use]
    pub fn tracked_hosts(&self) -> usize {
        self.entries.len()
    }

    /// Waits until a request to `host` is allowed, then records it.
    ///
    /// The first call for a host never waits. Later calls wait until the interval
    /// since the previous admitted request has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if `cancel` fires while waiting for the gate or sleeping.
    pub async fn acquire(&self, host: &str, cancel: &CancellationToken) -> Result<(), Cancelled> {
        let interval = self.interval_for(host);
        let entry = self.entry(host);

        let mut last_request = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Cancelled),
            guard = entry.last_request.lock() => guard,
        };

        if let Some(previous) = *last_request {
            let ready_at = previous + interval;
            let now = Instant::now();
            if ready_at > now {
                let wait = ready_at - now;
                warn!(host = %host, wait_ms = wait.as_millis(), "throttling request to host");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(Cancelled),
                    () = tokio::time::sleep_until(ready_at) => {}
                }
            }
        }

        *last_request = Some(Instant::now());
        Ok(())
    }

    fn entry(&self, host: &str) -> Arc<ThrottleEntry> {
        let key = host.to_ascii_lowercase();
        if let Some(entry) = self.entries.get(&key) {
            return entry.clone();
        }

        let entry = self.entries.entry(key.clone()).or_default().clone();
        if self.entries.len() > self.max_tracked_hosts {
            self.evict_oldest(&key);
        }
        entry
    }

    /// Evicts the idle entry with the oldest admitted request.
    ///
    /// Entries held by an in-flight `acquire` are skipped.
    fn evict_oldest(&self, keep: &str) {
        let mut oldest: Option<(String, Option<Instant>)> = None;

        for item in &self.entries {
            if item.key() == keep || Arc::strong_count(item.value()) > 1 {
                continue;
            }
            let Ok(last_request) = item.value().last_request.try_lock() else {
                continue;
            };
            let stamp = *last_request;
            let older = match &oldest {
                None => true,
                Some((_, current)) => stamp < *current,
            };
            if older {
                oldest = Some((item.key().clone(), stamp));
            }
        }

        if let Some((host, _)) = oldest {
            if self.entries.remove_if(&host, |_, entry| Arc::strong_count(entry) == 1).is_some() {
                debug!(host = %host, tracked = self.entries.len(), "evicted throttle entry");
            }
        }
    }
}

impl Default for HostThrottle {
    fn default() -> Self {
        Self::from_config(&ThrottleConfig::default())
    }
}
