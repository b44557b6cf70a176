//! Retry Policy
//!
//! The retry state machine is a pure function of (failed attempts, error
//! class). Waiting goes through a `Sleeper` so tests can skip the real
//! delays, which run into hours in production.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Whether a failure is worth retrying
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rate or usage limit; try again later
    Transient,
    /// Anything else; give up immediately
    Fatal,
}

/// What the transport should do after a failed attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    Wait(Duration),
    GiveUp,
}

/// Exponential backoff for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry; doubles on every further retry
    #[serde(with = "duration_secs")]
    pub base_delay: Duration,

    /// Upper bound for a single delay
    #[serde(with = "duration_secs")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// 2, 4, 8, 16, 32, 64 minutes
    fn default() -> Self {
        Self {
            max_retries: 6,
            base_delay: Duration::from_secs(120),
            max_delay: Duration::from_secs(64 * 60),
        }
    }
}

impl RetryPolicy {
    /// `failed_attempts` counts failures so far, starting at 1.
    pub fn decide(&self, failed_attempts: u32, class: ErrorClass) -> RetryDecision {
        if class == ErrorClass::Fatal || failed_attempts == 0 || failed_attempts > self.max_retries {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Wait(self.delay_for(failed_attempts))
    }

    fn delay_for(&self, failed_attempts: u32) -> Duration {
        let exponent = (failed_attempts - 1).min(20);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Every delay the policy would schedule for a run of transient failures
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_retries).map(|n| self.delay_for(n)).collect()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Injectable clock for backoff waits
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real waits on the tokio timer
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and remembers every requested wait
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(duration);
    }
}
