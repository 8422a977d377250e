use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Wire compression of document payloads
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct CompressionConfig {
    /// Enable zlib compression of payloads
    /// Tradeoff: Reduces bandwidth usage at the cost of CPU
    /// Default: true (enabled)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Payloads shorter than this are sent as-is
    /// Default: 32 bytes
    #[serde(default = "default_min_size")]
    pub min_size: usize,

    /// Compressed output is kept only when compressed/original <= min_ratio
    /// Default: 0.83
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            min_size: default_min_size(),
            min_ratio: default_min_ratio(),
        }
    }
}

impl CompressionConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_ratio > 0.0 && self.min_ratio <= 1.0) {
            return Err(Error::Config(ConfigError::Message(format!(
                "compression.min_ratio must be within (0, 1], got {}",
                self.min_ratio
            ))));
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}
fn default_min_size() -> usize {
    32
}
fn default_min_ratio() -> f64 {
    0.83
}
