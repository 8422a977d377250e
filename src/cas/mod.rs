//! Optimistic-concurrency read-modify-write.
//!
//! The controller reads a document, lets the caller compute the new
//! content and writes it back guarded by the cas it read. A concurrent
//! writer makes the replace fail with a cas mismatch; the controller then
//! starts over from a fresh read, up to a bound.


use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::sleep;
use tracing::debug;
use tracing::warn;

use crate::metrics::CAS_CONFLICT_COUNTER;
use crate::utils::scoped_timer::ScopedTimer;
use crate::Cas;
use crate::CasRetryConfig;
use crate::Document;
use crate::DurabilityLevel;
use crate::Error;
use crate::MutationResult;
use crate::OperationDispatcher;
use crate::OperationOutcome;
use crate::OperationRequest;
use crate::Result;

/// The two document operations a read-modify-write cycle needs.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentAccess: Send + Sync + 'static {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Document>;

    /// Replaces the document only if it still carries `cas`.
    async fn replace(
        &self,
        key: &str,
        content: Bytes,
        flags: u32,
        cas: Cas,
        durability: DurabilityLevel,
    ) -> Result<MutationResult>;
}

#[async_trait]
impl DocumentAccess for OperationDispatcher {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Document> {
        OperationDispatcher::get(self, key).await
    }

    async fn replace(
        &self,
        key: &str,
        content: Bytes,
        flags: u32,
        cas: Cas,
        durability: DurabilityLevel,
    ) -> Result<MutationResult> {
        let request = OperationRequest::replace(key, content, Some(cas))
            .with_flags(flags)
            .with_durability(durability);
        match self.execute(request).await? {
            OperationOutcome::Mutation(result) => Ok(result),
            other => Err(Error::Protocol(format!("unexpected outcome {other:?}"))),
        }
    }
}

/// Retries read-modify-write cycles that lose a cas race.
#[derive(Clone)]
pub struct CasRetryController {
    access: Arc<dyn DocumentAccess>,
    config: CasRetryConfig,
}

impl CasRetryController {
    pub fn new(
        access: Arc<dyn DocumentAccess>,
        config: CasRetryConfig,
    ) -> Self {
        Self { access, config }
    }

    /// Configured attempt bound (`cas.max_attempts`).
    pub fn default_max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Reads `key`, computes new content with `mutate_fn` and replaces the
    /// document guarded by the cas that was read.
    ///
    /// `mutate_fn` always sees the document from the read of the same
    /// attempt and may run up to `max_attempts` times, so it should be free
    /// of side effects.
    ///
    /// # Errors
    /// - [`Error::RetriesExhausted`] once `max_attempts` replaces conflicted
    /// - [`Error::InvalidArgument`] when `max_attempts` is 0
    /// - any other failure of the read, of `mutate_fn` or of the replace,
    ///   returned as is without retrying
    pub async fn perform_with_retry<F>(
        &self,
        key: &str,
        max_attempts: u32,
        durability: DurabilityLevel,
        mutate_fn: F,
    ) -> Result<MutationResult>
    where
        F: Fn(&Document) -> Result<Bytes> + Send + Sync,
    {
        if max_attempts == 0 {
            return Err(Error::InvalidArgument("max_attempts must be at least 1".into()));
        }
        let _timer = ScopedTimer::new("cas::perform_with_retry");

        let mut last_cas = None;
        for attempt in 1..=max_attempts {
            let document = self.access.get(key).await?;
            let content = mutate_fn(&document)?;

            match self
                .access
                .replace(key, content, document.flags, document.cas, durability)
                .await
            {
                Ok(result) => {
                    debug!(
                        "[:CasRetryController:perform] {} replaced on attempt {} ({} -> {})",
                        key, attempt, document.cas, result.cas
                    );
                    return Ok(result);
                }
                Err(Error::CasMismatch { .. }) => {
                    CAS_CONFLICT_COUNTER.inc();
                    last_cas = Some(document.cas);
                    debug!(
                        "[:CasRetryController:perform] {} conflict on attempt {} of {}",
                        key, attempt, max_attempts
                    );
                    if attempt < max_attempts {
                        let pause = self.config.conflict_pause();
                        if !pause.is_zero() {
                            sleep(pause).await;
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            "[:CasRetryController:perform] {} gave up after {} conflicting attempts",
            key, max_attempts
        );
        Err(Error::RetriesExhausted {
            key: key.to_string(),
            attempts: max_attempts,
            last_cas,
        })
    }

    /// [`Self::perform_with_retry`] over JSON content decoded into `T`.
    pub async fn perform_json_with_retry<T, F>(
        &self,
        key: &str,
        max_attempts: u32,
        durability: DurabilityLevel,
        mutate_fn: F,
    ) -> Result<MutationResult>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(T) -> Result<T> + Send + Sync,
    {
        self.perform_with_retry(key, max_attempts, durability, |document| {
            let current: T = document.content_as()?;
            let updated = mutate_fn(current)?;
            Ok(Bytes::from(serde_json::to_vec(&updated)?))
        })
        .await
    }
}
