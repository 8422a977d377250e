use std::sync::Arc;
use std::time::Duration;

use nanoid::nanoid;

use super::Client;
use super::ClientInner;
use crate::BackoffPolicy;
use crate::ClientConfig;
use crate::Result;
use crate::Transport;

/// Configurable builder for [`Client`] instances
///
/// # Typical Usage Flow
/// 1. Create with [`Client::builder`]
/// 2. Chain configuration methods
/// 3. Finalize with `.build()`, which validates the configuration
///
/// # Default Configuration
/// - Compression: Enabled
/// - KV Timeout: 2.5s
/// - Durable KV Timeout: 10s
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    client_id: Option<String>,
}

impl ClientBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            config: ClientConfig::default(),
            transport,
            client_id: None,
        }
    }

    /// Deadline of operations without durability (default: 2.5s)
    pub fn kv_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.timeouts.kv_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Deadline of writes that wait for durability (default: 10s)
    pub fn kv_durable_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.timeouts.kv_durable_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn retry_policy(
        mut self,
        policy: BackoffPolicy,
    ) -> Self {
        self.config.retry = policy;
        self
    }

    /// Enable/disable payload compression (default: enabled)
    pub fn enable_compression(
        mut self,
        enable: bool,
    ) -> Self {
        self.config.compression.enabled = enable;
        self
    }

    pub fn client_id(
        mut self,
        id: impl Into<String>,
    ) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Completely replaces the default configuration
    ///
    /// Settings applied earlier through the granular methods are discarded.
    pub fn set_config(
        mut self,
        config: ClientConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Validates the configuration and builds the client.
    pub fn build(self) -> Result<Client> {
        let config = self.config.validate()?;
        let client_id = self.client_id.unwrap_or_else(|| nanoid!());
        tracing::debug!("[:ClientBuilder:build] client {} with {:?}", client_id, config);

        Ok(Client::from_inner(ClientInner::shared(
            self.transport,
            config,
            client_id,
        )))
    }
}
