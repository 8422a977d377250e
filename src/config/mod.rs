//! Configuration management for the document store client.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Environment variable overrides
//! - Configuration file support
//! - Component-wise validation
mod compression;
mod durability;
mod retry;
mod timeouts;
pub use compression::*;
pub use durability::*;
pub use retry::*;
pub use timeouts::*;

#[cfg(test)]
mod config_test;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment variable prefix, e.g. `DOCSTORE__RETRY__MAX_ATTEMPTS=5`
pub const ENV_PREFIX: &str = "DOCSTORE";

/// Main configuration container for the client core
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct ClientConfig {
    /// Per-operation deadlines
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Backoff for transient transport failures
    #[serde(default)]
    pub retry: BackoffPolicy,
    /// Durability polling behaviour
    #[serde(default)]
    pub durability: DurabilityConfig,
    /// Optimistic-concurrency retry helper defaults
    #[serde(default)]
    pub cas: CasRetryConfig,
    /// Payload compression on the wire
    #[serde(default)]
    pub compression: CompressionConfig,
}

impl Debug for ClientConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("timeouts", &self.timeouts)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ClientConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `DOCSTORE__` prefix (highest priority)
    ///
    /// # Note
    /// This method does NOT validate the configuration. Callers MUST call `validate()`
    /// before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("DOCSTORE__TIMEOUTS__KV_TIMEOUT_MS", "5000");
    /// let cfg = ClientConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    ///
    /// Must be called after all configuration overrides so the final
    /// configuration is the one checked.
    pub fn validate(self) -> Result<Self> {
        self.timeouts.validate()?;
        self.retry.validate()?;
        self.durability.validate()?;
        self.cas.validate()?;
        self.compression.validate()?;
        Ok(self)
    }
}
