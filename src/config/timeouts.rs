use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::DurabilityLevel;
use crate::Error;
use crate::Result;

/// Default deadlines applied when a request does not carry its own
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct TimeoutConfig {
    /// Key-value operations without durability
    /// Default: 2.5 seconds
    #[serde(default = "default_kv_timeout_ms")]
    pub kv_timeout_ms: u64,

    /// Writes that also wait for a durability level
    /// Default: 10 seconds
    #[serde(default = "default_kv_durable_timeout_ms")]
    pub kv_durable_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            kv_timeout_ms: default_kv_timeout_ms(),
            kv_durable_timeout_ms: default_kv_durable_timeout_ms(),
        }
    }
}

impl TimeoutConfig {
    /// Deadline budget for an operation with the given durability.
    pub fn for_durability(
        &self,
        level: DurabilityLevel,
    ) -> Duration {
        match level {
            DurabilityLevel::None => Duration::from_millis(self.kv_timeout_ms),
            _ => Duration::from_millis(self.kv_durable_timeout_ms),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.kv_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "timeouts.kv_timeout_ms must be at least 1ms".into(),
            )));
        }

        if self.kv_durable_timeout_ms < self.kv_timeout_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "timeouts.kv_durable_timeout_ms {}ms should not be shorter than kv_timeout_ms {}ms",
                self.kv_durable_timeout_ms, self.kv_timeout_ms
            ))));
        }
        Ok(())
    }
}

fn default_kv_timeout_ms() -> u64 {
    2500
}
fn default_kv_durable_timeout_ms() -> u64 {
    10_000
}
