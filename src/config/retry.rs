use std::time::Duration;

use config::ConfigError;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Bounded exponential backoff for transient transport failures
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Single attempt timeout (unit: milliseconds)
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Randomise each delay within [delay/2, delay]
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1 = first retry).
    pub fn delay_for(
        &self,
        attempt: u32,
    ) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp).min(self.max_delay_ms);
        if self.jitter && delay > 1 {
            let jittered = rand::thread_rng().gen_range(delay / 2..=delay);
            Duration::from_millis(jittered)
        } else {
            Duration::from_millis(delay)
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(ConfigError::Message(
                "retry.max_attempts must be > 0".into(),
            )));
        }

        if self.attempt_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "retry.attempt_timeout_ms must be at least 1ms".into(),
            )));
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry.base_delay_ms {} should not exceed retry.max_delay_ms {}",
                self.base_delay_ms, self.max_delay_ms
            ))));
        }
        Ok(())
    }
}

/// Defaults for the optimistic-concurrency retry helper
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct CasRetryConfig {
    /// Replace attempts before giving up with `RetriesExhausted`
    #[serde(default = "default_cas_max_attempts")]
    pub max_attempts: u32,

    /// Upper bound of the random pause after a conflict (0 disables)
    #[serde(default = "default_conflict_backoff_ms")]
    pub conflict_backoff_ms: u64,
}

impl Default for CasRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_cas_max_attempts(),
            conflict_backoff_ms: default_conflict_backoff_ms(),
        }
    }
}

impl CasRetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(ConfigError::Message(
                "cas.max_attempts must be > 0".into(),
            )));
        }
        Ok(())
    }

    /// Random pause in `[0, conflict_backoff_ms]`.
    pub fn conflict_pause(&self) -> Duration {
        if self.conflict_backoff_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=self.conflict_backoff_ms))
    }
}

fn default_max_attempts() -> u32 {
    4
}
fn default_attempt_timeout_ms() -> u64 {
    1000
}
fn default_base_delay_ms() -> u64 {
    10
}
fn default_max_delay_ms() -> u64 {
    500
}
fn default_jitter() -> bool {
    true
}
fn default_cas_max_attempts() -> u32 {
    10
}
fn default_conflict_backoff_ms() -> u64 {
    5
}
