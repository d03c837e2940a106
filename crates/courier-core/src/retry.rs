//! Retry classification and per-invocation retry state.
//!
//! The engine threads a [`RetryState`] through its attempt loop and asks
//! [`RetryPolicy::next`] what to do after each failure. Decisions come back as
//! data so the loop owns every sleep and can race it against cancellation.

use rand::Rng;
use std::time::Duration;

use crate::{config::RetryConfig, errors::TransportError};

/// How an error should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Retry after a random jitter delay.
    RetryWithBackoff,
    /// Retry at once.
    RetryImmediate,
    /// Never retry.
    Fatal,
}

/// Outcome of [`RetryPolicy::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Send again, after the delay if one is given.
    Retry(Option<Duration>),
    /// Give up; the last error is final.
    Fail,
}

/// Retry bookkeeping for one logical invocation.
#[derive(Debug)]
pub struct RetryState {
    pub attempts_remaining: u32,
    pub attempts_made: u32,
    pub last_error: Option<TransportError>,
}

impl RetryState {
    /// Takes the error of the final attempt.
    pub fn take_last_error(&mut self) -> Option<TransportError> {
        self.last_error.take()
    }
}

/// Attempt budget and backoff range.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_min: Duration,
    backoff_max: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, backoff_min: Duration, backoff_max: Duration) -> Self {
        Self { max_retries, backoff_min, backoff_max: backoff_max.max(backoff_min) }
    }

    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.backoff_min_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Fresh state for a new invocation: one first attempt plus `max_retries`.
    #[must_use]
    pub fn start(&self) -> RetryState {
        RetryState {
            attempts_remaining: self.max_retries.saturating_add(1),
            attempts_made: 0,
            last_error: None,
        }
    }

    /// Maps an error onto its retry strategy.
    #[must_use]
    pub fn classify(error: &TransportError) -> RetryClass {
        use crate::errors::ErrorClass;

        match error.class() {
            ErrorClass::Connectivity => RetryClass::RetryWithBackoff,
            ErrorClass::Protocol | ErrorClass::Timeout => RetryClass::RetryImmediate,
            ErrorClass::InvalidRequest | ErrorClass::Cancelled | ErrorClass::FallbackExhausted => {
                RetryClass::Fatal
            }
        }
    }

    /// Records a failed attempt and decides whether to send again.
    ///
    /// The error is kept in `state.last_error` either way.
    pub fn next(&self, state: &mut RetryState, error: TransportError) -> RetryDecision {
        state.attempts_made += 1;
        state.attempts_remaining = state.attempts_remaining.saturating_sub(1);

        let class = Self::classify(&error);
        state.last_error = Some(error);

        if state.attempts_remaining == 0 {
            return RetryDecision::Fail;
        }

        match class {
            RetryClass::RetryWithBackoff => RetryDecision::Retry(Some(self.jitter())),
            RetryClass::RetryImmediate => RetryDecision::Retry(None),
            RetryClass::Fatal => RetryDecision::Fail,
        }
    }

    /// Random delay in `[backoff_min, backoff_max)`.
    fn jitter(&self) -> Duration {
        #[allow(clippy::cast_possible_truncation)]
        let min = self.backoff_min.as_millis() as u64;
        #[allow(clippy::cast_possible_truncation)]
        let max = self.backoff_max.as_millis() as u64;

        if max > min {
            Duration::from_millis(rand::rng().random_range(min..max))
        } else {
            self.backoff_min
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
