use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::constants::MAX_DOCUMENT_SIZE;
use crate::constants::MAX_EXPIRY;
use crate::constants::MAX_KEY_LEN;
use crate::constants::MAX_SUBDOC_SPECS;
use crate::protocol::Payload;
use crate::protocol::Request;
use crate::protocol::StoreSemantics;
use crate::subdoc::LookupSpec;
use crate::subdoc::MutateSpec;
use crate::subdoc::PathError;
use crate::Cas;
use crate::Document;
use crate::DurabilityLevel;
use crate::Error;
use crate::MutationResult;
use crate::MutationToken;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Get,
    Exists,
    Insert,
    Upsert,
    Replace,
    Remove,
    Touch,
    LookupIn,
    MutateIn,
    /// Durability polling issued on behalf of a write
    Observe,
}

impl OperationKind {
    /// Safe to resend when a previous attempt may have reached the store.
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self,
            OperationKind::Get | OperationKind::Exists | OperationKind::LookupIn | OperationKind::Observe
        )
    }

    pub fn is_mutation(&self) -> bool {
        !self.is_idempotent()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Get => "get",
            OperationKind::Exists => "exists",
            OperationKind::Insert => "insert",
            OperationKind::Upsert => "upsert",
            OperationKind::Replace => "replace",
            OperationKind::Remove => "remove",
            OperationKind::Touch => "touch",
            OperationKind::LookupIn => "lookup_in",
            OperationKind::MutateIn => "mutate_in",
            OperationKind::Observe => "observe",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single logical operation, created per call.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub key: String,
    pub payload: Option<Bytes>,
    pub flags: u32,
    pub lookup_specs: Vec<LookupSpec>,
    pub mutate_specs: Vec<MutateSpec>,
    pub cas: Option<Cas>,
    pub durability: DurabilityLevel,
    pub expiry: Option<Duration>,
    /// Overrides the configured deadline
    pub timeout: Option<Duration>,
    pub semantics: StoreSemantics,
}

impl OperationRequest {
    fn new(
        kind: OperationKind,
        key: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            key: key.into(),
            payload: None,
            flags: 0,
            lookup_specs: Vec::new(),
            mutate_specs: Vec::new(),
            cas: None,
            durability: DurabilityLevel::None,
            expiry: None,
            timeout: None,
            semantics: StoreSemantics::Replace,
        }
    }

    pub fn get(key: impl Into<String>) -> Self {
        Self::new(OperationKind::Get, key)
    }

    pub fn exists(key: impl Into<String>) -> Self {
        Self::new(OperationKind::Exists, key)
    }

    pub fn insert(
        key: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::new(OperationKind::Insert, key).with_payload(payload)
    }

    pub fn upsert(
        key: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::new(OperationKind::Upsert, key).with_payload(payload)
    }

    pub fn replace(
        key: impl Into<String>,
        payload: impl Into<Bytes>,
        cas: Option<Cas>,
    ) -> Self {
        let mut request = Self::new(OperationKind::Replace, key).with_payload(payload);
        request.cas = cas;
        request
    }

    pub fn remove(
        key: impl Into<String>,
        cas: Option<Cas>,
    ) -> Self {
        let mut request = Self::new(OperationKind::Remove, key);
        request.cas = cas;
        request
    }

    pub fn touch(
        key: impl Into<String>,
        expiry: Option<Duration>,
    ) -> Self {
        Self::new(OperationKind::Touch, key).with_expiry(expiry)
    }

    pub fn lookup_in(
        key: impl Into<String>,
        specs: Vec<LookupSpec>,
    ) -> Self {
        let mut request = Self::new(OperationKind::LookupIn, key);
        request.lookup_specs = specs;
        request
    }

    pub fn mutate_in(
        key: impl Into<String>,
        specs: Vec<MutateSpec>,
        options: MutateInOptions,
    ) -> Self {
        let mut request = Self::new(OperationKind::MutateIn, key);
        request.mutate_specs = specs;
        request.cas = options.cas;
        request.durability = options.durability;
        request.semantics = options.semantics;
        request.expiry = options.expiry;
        request.timeout = options.timeout;
        request
    }

    fn with_payload(
        mut self,
        payload: impl Into<Bytes>,
    ) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_durability(
        mut self,
        durability: DurabilityLevel,
    ) -> Self {
        self.durability = durability;
        self
    }

    pub fn with_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_expiry(
        mut self,
        expiry: Option<Duration>,
    ) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_flags(
        mut self,
        flags: u32,
    ) -> Self {
        self.flags = flags;
        self
    }

    /// Rejects requests the store would refuse, before any round trip.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(Error::InvalidArgument("key must not be empty".into()));
        }
        if self.key.len() > MAX_KEY_LEN {
            return Err(Error::InvalidArgument(format!(
                "key of {} bytes exceeds the {MAX_KEY_LEN} byte limit",
                self.key.len()
            )));
        }
        if let Some(payload) = &self.payload {
            if payload.len() > MAX_DOCUMENT_SIZE {
                return Err(Error::ValueTooLarge { key: self.key.clone() });
            }
        }
        if let Some(expiry) = self.expiry {
            if expiry > MAX_EXPIRY {
                return Err(Error::InvalidArgument(format!(
                    "expiry of {expiry:?} exceeds the {MAX_EXPIRY:?} limit"
                )));
            }
        }
        if self.durability != DurabilityLevel::None && !self.kind.is_mutation() {
            return Err(Error::InvalidArgument(format!("{} does not accept a durability level", self.kind)));
        }

        match self.kind {
            OperationKind::Insert | OperationKind::Upsert | OperationKind::Replace if self.payload.is_none() => {
                Err(Error::InvalidArgument(format!("{} requires a payload", self.kind)))
            }
            OperationKind::LookupIn => check_spec_count(self.lookup_specs.len()),
            OperationKind::MutateIn => {
                check_spec_count(self.mutate_specs.len())?;
                if self.semantics == StoreSemantics::Insert && self.cas.is_some() {
                    return Err(Error::InvalidArgument("insert semantics cannot carry a cas".into()));
                }
                Ok(())
            }
            OperationKind::Observe => Err(Error::InvalidArgument("observe is issued internally".into())),
            _ => Ok(()),
        }
    }

    pub(crate) fn to_wire(&self) -> Request {
        let key = self.key.clone();
        let payload = || Payload::raw(self.payload.clone().unwrap_or_default());
        match self.kind {
            OperationKind::Get => Request::Get { key },
            OperationKind::Exists => Request::Exists { key },
            OperationKind::Insert => Request::Insert {
                key,
                value: payload(),
                flags: self.flags,
                expiry: self.expiry,
            },
            OperationKind::Upsert => Request::Upsert {
                key,
                value: payload(),
                flags: self.flags,
                expiry: self.expiry,
            },
            OperationKind::Replace => Request::Replace {
                key,
                value: payload(),
                flags: self.flags,
                expiry: self.expiry,
                cas: self.cas,
            },
            OperationKind::Remove => Request::Remove { key, cas: self.cas },
            OperationKind::Touch => Request::Touch {
                key,
                expiry: self.expiry,
            },
            OperationKind::LookupIn => Request::LookupIn {
                key,
                specs: self.lookup_specs.clone(),
            },
            OperationKind::MutateIn => Request::MutateIn {
                key,
                specs: self.mutate_specs.clone(),
                cas: self.cas,
                semantics: self.semantics,
                expiry: self.expiry,
            },
            // rejected by validate
            OperationKind::Observe => Request::Observe { partition_id: 0 },
        }
    }

    /// Path of the spec at `index`, for error reporting.
    pub(crate) fn spec_path(
        &self,
        index: usize,
    ) -> &str {
        match self.kind {
            OperationKind::LookupIn => self.lookup_specs.get(index).map(|s| s.path.as_str()),
            OperationKind::MutateIn => self.mutate_specs.get(index).map(|s| s.path.as_str()),
            _ => None,
        }
        .unwrap_or("")
    }
}

fn check_spec_count(count: usize) -> Result<()> {
    if count == 0 || count > MAX_SUBDOC_SPECS {
        return Err(Error::InvalidArgument(format!(
            "between 1 and {MAX_SUBDOC_SPECS} sub-document specs required, got {count}"
        )));
    }
    Ok(())
}

/// Options of a `mutate_in` call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MutateInOptions {
    pub cas: Option<Cas>,
    pub durability: DurabilityLevel,
    pub semantics: StoreSemantics,
    pub expiry: Option<Duration>,
    pub timeout: Option<Duration>,
}

impl MutateInOptions {
    pub fn cas(
        mut self,
        cas: Cas,
    ) -> Self {
        self.cas = Some(cas);
        self
    }

    pub fn durability(
        mut self,
        durability: DurabilityLevel,
    ) -> Self {
        self.durability = durability;
        self
    }

    pub fn semantics(
        mut self,
        semantics: StoreSemantics,
    ) -> Self {
        self.semantics = semantics;
        self
    }

    pub fn expiry(
        mut self,
        expiry: Duration,
    ) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of a `lookup_in`; each spec succeeds or fails on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupInResult {
    pub key: String,
    pub cas: Cas,
    pub(crate) paths: Vec<String>,
    pub(crate) results: Vec<std::result::Result<Vec<u8>, PathError>>,
}

impl LookupInResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Decodes the value found by spec `index`.
    pub fn content_as<T: DeserializeOwned>(
        &self,
        index: usize,
    ) -> Result<T> {
        let raw = self.raw(index)?;
        Ok(serde_json::from_slice(raw)?)
    }

    /// Outcome of an `exists` spec; path errors other than absence are
    /// still reported.
    pub fn exists(
        &self,
        index: usize,
    ) -> Result<bool> {
        match self.results.get(index) {
            Some(Err(PathError::NotFound)) => Ok(false),
            _ => self.content_as(index),
        }
    }

    fn raw(
        &self,
        index: usize,
    ) -> Result<&[u8]> {
        match self.results.get(index) {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(e)) => {
                let path = self.paths.get(index).map(String::as_str).unwrap_or("");
                Err(e.clone().into_error(&self.key, path))
            }
            None => Err(Error::InvalidArgument(format!(
                "no spec at index {index}, lookup had {}",
                self.results.len()
            ))),
        }
    }
}

/// Result of a successful `mutate_in`.
#[derive(Debug, Clone, PartialEq)]
pub struct MutateInResult {
    pub cas: Cas,
    pub token: MutationToken,
    pub(crate) results: Vec<Option<Vec<u8>>>,
}

impl MutateInResult {
    pub fn mutation(&self) -> MutationResult {
        MutationResult {
            cas: self.cas,
            token: self.token,
        }
    }

    /// Value produced by spec `index`; only counters produce one.
    pub fn content_as<T: DeserializeOwned>(
        &self,
        index: usize,
    ) -> Result<T> {
        match self.results.get(index) {
            Some(Some(raw)) => Ok(serde_json::from_slice(raw)?),
            _ => Err(Error::InvalidArgument(format!("spec {index} produced no value"))),
        }
    }
}

/// What a dispatched operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Document(Document),
    Exists(Option<Cas>),
    Mutation(MutationResult),
    LookupIn(LookupInResult),
    MutateIn(MutateInResult),
}

impl OperationOutcome {
    pub fn mutation_result(&self) -> Option<MutationResult> {
        match self {
            OperationOutcome::Mutation(m) => Some(*m),
            OperationOutcome::MutateIn(r) => Some(r.mutation()),
            _ => None,
        }
    }
}
