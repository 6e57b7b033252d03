//! Configuration for booking command execution.
//!
//! Every tunable is a `nutype` newtype validated at construction, so an
//! out-of-range value is rejected when the configuration is built or
//! deserialized rather than when a command runs.

use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How appends guard against concurrent writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyControl {
    /// Append with the version read; a concurrent append fails the command.
    #[default]
    Optimistic,
    /// Append unconditionally. Two racing commands may both succeed, each
    /// against the state it read.
    Unchecked,
}

/// Total attempts per command, including the first.
///
/// Validated to be between 1 and 10. One means no automatic retry.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct MaxAttempts(u32);

/// Delay before the first retry, in milliseconds.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct RetryBaseDelayMs(u64);

impl RetryBaseDelayMs {
    /// Convert to Duration for use with tokio::time::sleep.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into_inner())
    }
}

/// Upper bound on any single retry delay, in milliseconds.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 300_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct RetryMaxDelayMs(u64);

impl RetryMaxDelayMs {
    /// Convert to Duration for use with tokio::time::sleep.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into_inner())
    }
}

/// Growth factor between consecutive retry delays.
#[nutype(
    validate(finite, greater_or_equal = 1.0, less_or_equal = 3.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Into, Serialize, Deserialize)
)]
pub struct BackoffMultiplier(f64);

/// Limit on a single event store operation, in milliseconds.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 600_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct StoreTimeoutMs(u64);

impl StoreTimeoutMs {
    /// Convert to Duration for use with tokio::time::timeout.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into_inner())
    }
}

/// Retry behavior for commands that lose an optimistic concurrency race.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per command.
    pub max_attempts: MaxAttempts,
    /// Delay before the first retry.
    pub base_delay: RetryBaseDelayMs,
    /// Cap on any single delay.
    pub max_delay: RetryMaxDelayMs,
    /// Multiplier applied per retry.
    pub backoff_multiplier: BackoffMultiplier,
}

impl RetryConfig {
    /// Set the total number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: MaxAttempts) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub const fn with_base_delay(mut self, base_delay: RetryBaseDelayMs) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Backoff delay before retry number `retry` (1-based), without jitter.
    ///
    /// Grows as `base_delay * backoff_multiplier^(retry - 1)` and never
    /// exceeds `max_delay`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let base_ms = self.base_delay.into_inner() as f64;
        let max_ms = self.max_delay.into_inner() as f64;
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);

        let delay_ms = base_ms * self.backoff_multiplier.into_inner().powi(exponent);
        if !delay_ms.is_finite() || delay_ms > max_ms {
            return self.max_delay.as_duration();
        }

        Duration::from_millis(delay_ms as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: MaxAttempts::try_new(1).expect("1 is a valid attempt count"),
            base_delay: RetryBaseDelayMs::try_new(10).expect("10ms is a valid base delay"),
            max_delay: RetryMaxDelayMs::try_new(1_000).expect("1s is a valid max delay"),
            backoff_multiplier: BackoffMultiplier::try_new(2.0)
                .expect("2.0 is a valid backoff multiplier"),
        }
    }
}

/// Everything a [`Booking`](crate::Booking) needs besides its store.
///
/// Missing fields deserialize to their defaults: optimistic concurrency,
/// no automatic retry, no store timeout.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    /// Append guard.
    pub concurrency: ConcurrencyControl,
    /// Conflict retry policy.
    pub retry: RetryConfig,
    /// Per-operation store limit; `None` waits indefinitely.
    pub store_timeout: Option<StoreTimeoutMs>,
}

impl BookingConfig {
    /// Set the concurrency control mode.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: ConcurrencyControl) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Bound every store operation by `timeout`.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: StoreTimeoutMs) -> Self {
        self.store_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry(base_ms: u64, max_ms: u64, multiplier: f64) -> RetryConfig {
        RetryConfig {
            max_attempts: MaxAttempts::try_new(5).expect("valid attempts"),
            base_delay: RetryBaseDelayMs::try_new(base_ms).expect("valid base delay"),
            max_delay: RetryMaxDelayMs::try_new(max_ms).expect("valid max delay"),
            backoff_multiplier: BackoffMultiplier::try_new(multiplier).expect("valid multiplier"),
        }
    }

    #[test]
    fn defaults_are_optimistic_without_retry_or_timeout() {
        let config = BookingConfig::default();

        assert_eq!(config.concurrency, ConcurrencyControl::Optimistic);
        assert_eq!(config.retry.max_attempts.into_inner(), 1);
        assert_eq!(config.store_timeout, None);
    }

    #[test]
    fn validated_newtypes_reject_out_of_range_values() {
        assert!(MaxAttempts::try_new(0).is_err());
        assert!(MaxAttempts::try_new(11).is_err());
        assert!(RetryBaseDelayMs::try_new(0).is_err());
        assert!(RetryMaxDelayMs::try_new(300_001).is_err());
        assert!(BackoffMultiplier::try_new(0.5).is_err());
        assert!(BackoffMultiplier::try_new(f64::NAN).is_err());
        assert!(StoreTimeoutMs::try_new(0).is_err());
    }

    #[test]
    fn delays_grow_exponentially() {
        let config = retry(10, 10_000, 2.0);

        let delays: Vec<u64> = (1..=4)
            .map(|retry| config.delay_for_attempt(retry).as_millis() as u64)
            .collect();

        assert_eq!(delays, vec![10, 20, 40, 80]);
    }

    #[test]
    fn delays_are_capped_at_max_delay() {
        let config = retry(100, 250, 3.0);

        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(250));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_millis(250));
    }

    #[test]
    fn builders_replace_single_fields() {
        let timeout = StoreTimeoutMs::try_new(500).expect("valid timeout");
        let attempts = MaxAttempts::try_new(3).expect("valid attempts");

        let config = BookingConfig::default()
            .with_concurrency(ConcurrencyControl::Unchecked)
            .with_retry(RetryConfig::default().with_max_attempts(attempts))
            .with_store_timeout(timeout);

        assert_eq!(config.concurrency, ConcurrencyControl::Unchecked);
        assert_eq!(config.retry.max_attempts, attempts);
        assert_eq!(
            config.store_timeout.map(StoreTimeoutMs::as_duration),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn deserializes_partial_documents_with_defaults() {
        let config: BookingConfig = serde_json::from_str(
            r#"{ "concurrency": "unchecked", "retry": { "max_attempts": 3 } }"#,
        )
        .expect("valid configuration");

        assert_eq!(config.concurrency, ConcurrencyControl::Unchecked);
        assert_eq!(config.retry.max_attempts.into_inner(), 3);
        assert_eq!(config.retry.base_delay.into_inner(), 10);
        assert_eq!(config.store_timeout, None);
    }

    #[test]
    fn deserialization_rejects_invalid_values() {
        let result =
            serde_json::from_str::<BookingConfig>(r#"{ "retry": { "max_attempts": 0 } }"#);

        assert!(result.is_err());
    }
}
