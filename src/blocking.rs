//! Synchronous facade over [`Client`].
//!
//! Drives the same async operations on a private current-thread runtime.
//! Must not be used from inside an async context: `block_on` panics there.

use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Builder;
use tokio::runtime::Runtime;

use crate::subdoc::LookupSpec;
use crate::subdoc::MutateSpec;
use crate::Cas;
use crate::Client;
use crate::Document;
use crate::DurabilityLevel;
use crate::LookupInResult;
use crate::MutateInOptions;
use crate::MutateInResult;
use crate::MutationResult;
use crate::Result;

pub struct BlockingClient {
    client: Client,
    runtime: Runtime,
}

impl BlockingClient {
    pub fn new(client: Client) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { client, runtime })
    }

    /// The async client underneath.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Result<Document> {
        self.runtime.block_on(self.client.get(key))
    }

    pub fn exists(
        &self,
        key: &str,
    ) -> Result<Option<Cas>> {
        self.runtime.block_on(self.client.exists(key))
    }

    pub fn insert(
        &self,
        key: &str,
        payload: impl Into<Bytes>,
        durability: DurabilityLevel,
    ) -> Result<MutationResult> {
        self.runtime.block_on(self.client.insert(key, payload, durability))
    }

    pub fn upsert(
        &self,
        key: &str,
        payload: impl Into<Bytes>,
        durability: DurabilityLevel,
    ) -> Result<MutationResult> {
        self.runtime.block_on(self.client.upsert(key, payload, durability))
    }

    pub fn replace(
        &self,
        key: &str,
        payload: impl Into<Bytes>,
        expected_cas: Option<Cas>,
        durability: DurabilityLevel,
    ) -> Result<MutationResult> {
        self.runtime
            .block_on(self.client.replace(key, payload, expected_cas, durability))
    }

    pub fn remove(
        &self,
        key: &str,
        expected_cas: Option<Cas>,
    ) -> Result<MutationResult> {
        self.runtime.block_on(self.client.remove(key, expected_cas))
    }

    pub fn touch(
        &self,
        key: &str,
        expiry: Option<Duration>,
    ) -> Result<MutationResult> {
        self.runtime.block_on(self.client.touch(key, expiry))
    }

    pub fn lookup_in(
        &self,
        key: &str,
        specs: Vec<LookupSpec>,
    ) -> Result<LookupInResult> {
        self.runtime.block_on(self.client.lookup_in(key, specs))
    }

    pub fn mutate_in(
        &self,
        key: &str,
        specs: Vec<MutateSpec>,
        options: MutateInOptions,
    ) -> Result<MutateInResult> {
        self.runtime.block_on(self.client.mutate_in(key, specs, options))
    }

    pub fn counter_increment(
        &self,
        key: &str,
        path: &str,
        delta: i64,
        durability: DurabilityLevel,
    ) -> Result<i64> {
        self.runtime
            .block_on(self.client.counter_increment(key, path, delta, durability))
    }

    /// Blocking form of [`crate::CasRetryController::perform_with_retry`].
    pub fn perform_with_retry<F>(
        &self,
        key: &str,
        max_attempts: u32,
        durability: DurabilityLevel,
        mutate_fn: F,
    ) -> Result<MutationResult>
    where
        F: Fn(&Document) -> Result<Bytes> + Send + Sync,
    {
        self.runtime.block_on(
            self.client
                .cas()
                .perform_with_retry(key, max_attempts, durability, mutate_fn),
        )
    }
}
