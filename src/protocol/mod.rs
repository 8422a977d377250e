//! Wire frames exchanged with the store.
//!
//! Every request carries an `opaque` id chosen by the client; the response to
//! it echoes the same id so multiplexed replies can be matched. JSON travels
//! as raw bytes inside the frames.

mod codec;
pub use codec::*;


use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;

use crate::subdoc::LookupSpec;
use crate::subdoc::MutateSpec;
use crate::subdoc::PathError;
use crate::Cas;
use crate::MutationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub opaque: u32,
    pub body: Request,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Get {
        key: String,
    },
    Exists {
        key: String,
    },
    Insert {
        key: String,
        value: Payload,
        flags: u32,
        expiry: Option<Duration>,
    },
    Upsert {
        key: String,
        value: Payload,
        flags: u32,
        expiry: Option<Duration>,
    },
    Replace {
        key: String,
        value: Payload,
        flags: u32,
        expiry: Option<Duration>,
        cas: Option<Cas>,
    },
    Remove {
        key: String,
        cas: Option<Cas>,
    },
    Touch {
        key: String,
        expiry: Option<Duration>,
    },
    LookupIn {
        key: String,
        specs: Vec<LookupSpec>,
    },
    MutateIn {
        key: String,
        specs: Vec<MutateSpec>,
        cas: Option<Cas>,
        semantics: StoreSemantics,
        expiry: Option<Duration>,
    },
    /// Replication and persistence progress of one partition
    Observe {
        partition_id: u16,
    },
}

impl Request {
    pub fn key(&self) -> Option<&str> {
        match self {
            Request::Get { key }
            | Request::Exists { key }
            | Request::Insert { key, .. }
            | Request::Upsert { key, .. }
            | Request::Replace { key, .. }
            | Request::Remove { key, .. }
            | Request::Touch { key, .. }
            | Request::LookupIn { key, .. }
            | Request::MutateIn { key, .. } => Some(key),
            Request::Observe { .. } => None,
        }
    }

    pub fn payload_mut(&mut self) -> Option<&mut Payload> {
        match self {
            Request::Insert { value, .. } | Request::Upsert { value, .. } | Request::Replace { value, .. } => {
                Some(value)
            }
            _ => None,
        }
    }
}

/// How `mutate_in` treats a missing or existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StoreSemantics {
    /// Document must exist
    #[default]
    Replace,
    /// Create an empty object when missing
    Upsert,
    /// Document must not exist yet
    Insert,
}

/// Document body, possibly zlib-compressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub data: Bytes,
    pub compressed: bool,
}

impl Payload {
    pub fn raw(data: Bytes) -> Self {
        Self {
            data,
            compressed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub opaque: u32,
    pub status: Status,
    pub body: Response,
}

impl ResponseFrame {
    pub fn error(
        opaque: u32,
        status: Status,
    ) -> Self {
        Self {
            opaque,
            status,
            body: Response::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Success,
    KeyNotFound,
    KeyExists,
    CasMismatch,
    ValueTooLarge,
    /// Store is busy; nothing was applied
    TemporaryFailure,
    Invalid(String),
    /// Spec at `index` failed; for mutate_in nothing was applied
    SubdocFailure {
        index: u16,
        error: PathError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Empty,
    Document {
        value: Payload,
        cas: Cas,
        flags: u32,
        expiry: Option<Duration>,
    },
    Exists {
        cas: Cas,
    },
    Mutation {
        cas: Cas,
        token: MutationToken,
    },
    LookupIn {
        cas: Cas,
        results: Vec<Result<Vec<u8>, PathError>>,
    },
    MutateIn {
        cas: Cas,
        token: MutationToken,
        results: Vec<Option<Vec<u8>>>,
    },
    Observe(Observation),
}

/// Snapshot of a partition's copies as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub partition_id: u16,
    /// Changes whenever the partition fails over
    pub partition_uuid: u64,
    pub high_seqno: u64,
    pub nodes: Vec<ReplicaState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaState {
    pub node_id: u32,
    pub active: bool,
    pub online: bool,
    /// Highest seqno held in memory
    pub replicated_seqno: u64,
    /// Highest seqno written to disk
    pub persisted_seqno: u64,
}
