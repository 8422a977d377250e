//! Operation dispatch.
//!
//! Turns logical key-value and sub-document operations into request frames,
//! drives them through the shared [`crate::Transport`] with bounded backoff,
//! interprets the store's answer and, for durable writes, waits for the
//! requested [`DurabilityLevel`].

mod request;
mod retry;

pub use request::*;


use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use tracing::error;

use crate::client::ClientInner;
use crate::constants::JSON_FLAGS;
use crate::metrics::OPERATION_COUNTER;
use crate::protocol::Response;
use crate::protocol::ResponseFrame;
use crate::protocol::Status;
use crate::protocol::StoreSemantics;
use crate::subdoc::LookupSpec;
use crate::subdoc::MutateSpec;
use crate::subdoc::SubdocPath;
use crate::utils::scoped_timer::ScopedTimer;
use crate::utils::time::Deadline;
use crate::Cas;
use crate::Document;
use crate::DurabilityLevel;
use crate::DurabilityTracker;
use crate::Error;
use crate::MutationResult;
use crate::Result;

/// Executes single-document operations against the store.
///
/// Cheap to clone; clones share the transport and configuration, and see
/// transport swaps made through [`crate::Client::refresh`].
#[derive(Clone)]
pub struct OperationDispatcher {
    inner: Arc<ArcSwap<ClientInner>>,
    tracker: DurabilityTracker,
}

impl OperationDispatcher {
    pub(crate) fn new(inner: Arc<ArcSwap<ClientInner>>) -> Self {
        Self {
            tracker: DurabilityTracker::new(inner.clone()),
            inner,
        }
    }

    /// Fetches a document.
    ///
    /// # Errors
    /// - [`Error::NotFound`] if the key holds no document
    pub async fn get(
        &self,
        key: impl Into<String>,
    ) -> Result<Document> {
        match self.execute(OperationRequest::get(key)).await? {
            OperationOutcome::Document(doc) => Ok(doc),
            other => Err(unexpected(other)),
        }
    }

    /// Fetches a document and decodes its JSON content.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        key: impl Into<String>,
    ) -> Result<(T, Cas)> {
        let doc = self.get(key).await?;
        Ok((doc.content_as()?, doc.cas))
    }

    /// Cas of the document, `None` when it does not exist.
    pub async fn exists(
        &self,
        key: impl Into<String>,
    ) -> Result<Option<Cas>> {
        match self.execute(OperationRequest::exists(key)).await? {
            OperationOutcome::Exists(cas) => Ok(cas),
            other => Err(unexpected(other)),
        }
    }

    /// Creates a document; fails with [`Error::KeyExists`] if one is present.
    pub async fn insert(
        &self,
        key: impl Into<String>,
        payload: impl Into<Bytes>,
        durability: DurabilityLevel,
    ) -> Result<MutationResult> {
        self.mutate(OperationRequest::insert(key, payload).with_durability(durability))
            .await
    }

    /// Creates or overwrites a document.
    pub async fn upsert(
        &self,
        key: impl Into<String>,
        payload: impl Into<Bytes>,
        durability: DurabilityLevel,
    ) -> Result<MutationResult> {
        self.mutate(OperationRequest::upsert(key, payload).with_durability(durability))
            .await
    }

    pub async fn upsert_json<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        value: &T,
        durability: DurabilityLevel,
    ) -> Result<MutationResult> {
        let payload = serde_json::to_vec(value)?;
        self.mutate(
            OperationRequest::upsert(key, payload)
                .with_flags(JSON_FLAGS)
                .with_durability(durability),
        )
        .await
    }

    /// Overwrites an existing document.
    ///
    /// With `expected_cas` the write only lands if the stored document still
    /// carries that cas.
    ///
    /// # Errors
    /// - [`Error::NotFound`] if the document is gone
    /// - [`Error::CasMismatch`] if it changed since `expected_cas` was read
    pub async fn replace(
        &self,
        key: impl Into<String>,
        payload: impl Into<Bytes>,
        expected_cas: Option<Cas>,
        durability: DurabilityLevel,
    ) -> Result<MutationResult> {
        self.mutate(OperationRequest::replace(key, payload, expected_cas).with_durability(durability))
            .await
    }

    pub async fn remove(
        &self,
        key: impl Into<String>,
        expected_cas: Option<Cas>,
    ) -> Result<MutationResult> {
        self.mutate(OperationRequest::remove(key, expected_cas)).await
    }

    /// Resets the expiry of a document; `None` makes it permanent.
    pub async fn touch(
        &self,
        key: impl Into<String>,
        expiry: Option<Duration>,
    ) -> Result<MutationResult> {
        self.mutate(OperationRequest::touch(key, expiry)).await
    }

    /// Reads several paths of one document in a single round trip.
    ///
    /// Individual path failures are reported per spec in the result; only
    /// document-level failures fail the call.
    pub async fn lookup_in(
        &self,
        key: impl Into<String>,
        specs: Vec<LookupSpec>,
    ) -> Result<LookupInResult> {
        match self.execute(OperationRequest::lookup_in(key, specs)).await? {
            OperationOutcome::LookupIn(result) => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    /// Applies several path mutations atomically: either all specs succeed
    /// or the document is left untouched and the failing spec is reported.
    pub async fn mutate_in(
        &self,
        key: impl Into<String>,
        specs: Vec<MutateSpec>,
        options: MutateInOptions,
    ) -> Result<MutateInResult> {
        match self.execute(OperationRequest::mutate_in(key, specs, options)).await? {
            OperationOutcome::MutateIn(result) => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    /// Adds `delta` to the integer at `path`, creating the document and
    /// path when missing. Returns the new value.
    pub async fn counter_increment(
        &self,
        key: impl Into<String>,
        path: &str,
        delta: i64,
        durability: DurabilityLevel,
    ) -> Result<i64> {
        let options = MutateInOptions::default()
            .semantics(StoreSemantics::Upsert)
            .durability(durability);
        let result = self
            .mutate_in(key, vec![MutateSpec::counter(path, delta).create_path()], options)
            .await?;
        result.content_as(0)
    }

    async fn mutate(
        &self,
        request: OperationRequest,
    ) -> Result<MutationResult> {
        let outcome = self.execute(request).await?;
        outcome.mutation_result().ok_or_else(|| unexpected(outcome))
    }

    /// Runs one operation to completion.
    ///
    /// Every named operation goes through here. The deadline covers the
    /// round trips, backoff sleeps and the durability wait.
    pub async fn execute(
        &self,
        request: OperationRequest,
    ) -> Result<OperationOutcome> {
        let _timer = ScopedTimer::new(timer_name(request.kind));
        let result = self.dispatch(&request).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) if e.is_ambiguous() => "ambiguous",
            Err(_) => "error",
        };
        OPERATION_COUNTER.with_label_values(&[request.kind.as_str(), outcome]).inc();
        result
    }

    async fn dispatch(
        &self,
        request: &OperationRequest,
    ) -> Result<OperationOutcome> {
        request.validate()?;
        validate_paths(request)?;

        let inner = self.inner.load_full();
        let budget = request
            .timeout
            .unwrap_or_else(|| inner.config.timeouts.for_durability(request.durability));
        let deadline = Deadline::after(budget);

        let frame = retry::send_with_retry(&inner.channel, &inner.config.retry, request, &deadline).await?;
        let outcome = interpret(request, frame)?;
        debug!("[:Dispatcher:{}] {} -> {:?}", request.kind, request.key, outcome);

        if request.durability != DurabilityLevel::None {
            if let Some(mutation) = outcome.mutation_result() {
                self.tracker
                    .await_durability(
                        &request.key,
                        mutation.cas,
                        mutation.token,
                        request.durability,
                        deadline.remaining(),
                    )
                    .await
                    .map_err(|e| attribute_to(e, request))?;
            }
        }
        Ok(outcome)
    }
}

fn validate_paths(request: &OperationRequest) -> Result<()> {
    let paths = request
        .lookup_specs
        .iter()
        .map(|s| s.path.as_str())
        .chain(request.mutate_specs.iter().map(|s| s.path.as_str()));
    for path in paths {
        SubdocPath::parse(path).map_err(|e| e.into_error(&request.key, path))?;
    }
    Ok(())
}

/// Maps a store response onto the outcome of `request`.
fn interpret(
    request: &OperationRequest,
    frame: ResponseFrame,
) -> Result<OperationOutcome> {
    let key = request.key.clone();
    match frame.status {
        Status::Success => {}
        Status::KeyNotFound if request.kind == OperationKind::Exists => {
            return Ok(OperationOutcome::Exists(None));
        }
        Status::KeyNotFound => return Err(Error::NotFound { key }),
        Status::KeyExists => return Err(Error::KeyExists { key }),
        Status::CasMismatch => {
            return Err(Error::CasMismatch {
                key,
                attempted: request.cas.unwrap_or(Cas(0)),
            })
        }
        Status::ValueTooLarge => return Err(Error::ValueTooLarge { key }),
        Status::Invalid(reason) => return Err(Error::InvalidArgument(reason)),
        Status::SubdocFailure { index, error } => {
            return Err(error.into_error(&key, request.spec_path(index as usize)));
        }
        Status::TemporaryFailure => {
            return Err(Error::Protocol("temporary failure escaped the retry loop".into()));
        }
    }

    let outcome = match (request.kind, frame.body) {
        (
            OperationKind::Get,
            Response::Document {
                value,
                cas,
                flags,
                expiry,
            },
        ) => OperationOutcome::Document(Document {
            key,
            content: value.data,
            cas,
            expiry,
            flags,
        }),
        (OperationKind::Exists, Response::Exists { cas }) => OperationOutcome::Exists(Some(cas)),
        (
            OperationKind::Insert
            | OperationKind::Upsert
            | OperationKind::Replace
            | OperationKind::Remove
            | OperationKind::Touch,
            Response::Mutation { cas, token },
        ) => OperationOutcome::Mutation(MutationResult { cas, token }),
        (OperationKind::LookupIn, Response::LookupIn { cas, results }) => {
            OperationOutcome::LookupIn(LookupInResult {
                key,
                cas,
                paths: request.lookup_specs.iter().map(|s| s.path.clone()).collect(),
                results,
            })
        }
        (OperationKind::MutateIn, Response::MutateIn { cas, token, results }) => {
            OperationOutcome::MutateIn(MutateInResult { cas, token, results })
        }
        (kind, body) => {
            error!("[:Dispatcher:{}] unexpected response body: {:?}", kind, body);
            return Err(Error::Protocol(format!("unexpected response to {kind}")));
        }
    };
    Ok(outcome)
}

/// Durability failures are reported against the write that caused them.
fn attribute_to(
    error: Error,
    request: &OperationRequest,
) -> Error {
    match error {
        Error::AmbiguousOutcome {
            key, cas, level, reason, ..
        } => Error::AmbiguousOutcome {
            key,
            op: request.kind,
            cas,
            level,
            reason,
        },
        e => e,
    }
}

fn unexpected(outcome: OperationOutcome) -> Error {
    Error::Protocol(format!("unexpected outcome {outcome:?}"))
}

fn timer_name(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Get => "dispatcher::get",
        OperationKind::Exists => "dispatcher::exists",
        OperationKind::Insert => "dispatcher::insert",
        OperationKind::Upsert => "dispatcher::upsert",
        OperationKind::Replace => "dispatcher::replace",
        OperationKind::Remove => "dispatcher::remove",
        OperationKind::Touch => "dispatcher::touch",
        OperationKind::LookupIn => "dispatcher::lookup_in",
        OperationKind::MutateIn => "dispatcher::mutate_in",
        OperationKind::Observe => "dispatcher::observe",
    }
}
