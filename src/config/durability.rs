use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Polling behaviour of the durability tracker
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct DurabilityConfig {
    /// First pause between observe polls (unit: milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// The pause doubles after every unsatisfied poll up to this bound
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,

    /// Timeout of a single observe round trip (unit: milliseconds)
    #[serde(default = "default_observe_timeout_ms")]
    pub observe_timeout_ms: u64,
}

impl Default for DurabilityConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            observe_timeout_ms: default_observe_timeout_ms(),
        }
    }
}

impl DurabilityConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms)
    }

    pub fn observe_timeout(&self) -> Duration {
        Duration::from_millis(self.observe_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "durability.poll_interval_ms cannot be 0".into(),
            )));
        }

        if self.poll_interval_ms > self.max_poll_interval_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "durability.poll_interval_ms {} should not exceed max_poll_interval_ms {}",
                self.poll_interval_ms, self.max_poll_interval_ms
            ))));
        }

        if self.observe_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "durability.observe_timeout_ms must be at least 1ms".into(),
            )));
        }
        Ok(())
    }
}

fn default_poll_interval_ms() -> u64 {
    2
}
fn default_max_poll_interval_ms() -> u64 {
    100
}
fn default_observe_timeout_ms() -> u64 {
    500
}
