//! Error hierarchy for the document store client core.
//!
//! Every key-scoped failure carries the key it happened on, CAS failures carry
//! the CAS the caller attempted, and durability failures carry the requested
//! level, so callers can decide whether to retry, abort or reconcile.

use std::time::Duration;

use config::ConfigError;

use crate::Cas;
use crate::DurabilityLevel;
use crate::OperationKind;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document does not exist (or has expired)
    #[error("document not found: {key}")]
    NotFound { key: String },

    /// Insert targeted a key that already holds a document
    #[error("document already exists: {key}")]
    KeyExists { key: String },

    /// The stored CAS no longer matches the one supplied by the caller
    #[error("cas mismatch on {key}: attempted {attempted}")]
    CasMismatch { key: String, attempted: Cas },

    /// Optimistic update kept conflicting until the attempt bound was reached
    #[error("cas retries exhausted on {key} after {attempts} attempts")]
    RetriesExhausted {
        key: String,
        attempts: u32,
        last_cas: Option<Cas>,
    },

    /// The write landed on the primary but the requested durability was not
    /// confirmed in time. The mutation has NOT been rolled back.
    #[error(
        "durability {level:?} not confirmed for {key} (cas {cas}) within {timeout:?}: \
         replicated={replicated} persisted={persisted}"
    )]
    DurabilityTimeout {
        key: String,
        cas: Cas,
        level: DurabilityLevel,
        timeout: Duration,
        replicated: usize,
        persisted: usize,
    },

    /// The requested durability cannot be reached with the current topology.
    /// The write itself was applied with `cas`.
    #[error(
        "durability {level:?} impossible for {key} (cas {cas}): requires {required} nodes, {available} available"
    )]
    DurabilityImpossible {
        key: String,
        cas: Cas,
        level: DurabilityLevel,
        required: usize,
        available: usize,
    },

    #[error("path not found in {key}: '{path}'")]
    PathNotFound { key: String, path: String },

    #[error("path already exists in {key}: '{path}'")]
    PathExists { key: String, path: String },

    /// Path resolves through a value of the wrong type
    #[error("path mismatch in {key} at '{path}': {reason}")]
    PathMismatch {
        key: String,
        path: String,
        reason: String,
    },

    /// Path expression could not be parsed
    #[error("invalid path '{path}': {reason}")]
    PathInvalid { path: String, reason: String },

    /// Counter delta would overflow the stored integer
    #[error("counter delta out of range in {key} at '{path}'")]
    DeltaRange { key: String, path: String },

    #[error("value too large for {key}")]
    ValueTooLarge { key: String },

    /// The write may or may not have been applied by the store
    #[error("ambiguous outcome for {op} on {key}: {reason}")]
    AmbiguousOutcome {
        key: String,
        op: OperationKind,
        cas: Option<Cas>,
        level: DurabilityLevel,
        reason: String,
    },

    /// Deadline expired before the store could have applied anything
    #[error("{op} on {key} timed out after {elapsed:?}")]
    Timeout {
        key: String,
        op: OperationKind,
        elapsed: Duration,
    },

    /// Transient transport failure that outlasted the retry budget
    #[error("{op} on {key} failed after {attempts} attempts: {source}")]
    Transport {
        key: String,
        op: OperationKind,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// Malformed or unexpected frame
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Bincode(#[from] bincode::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Failures reported by the [`crate::Transport`] collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No connection could be established; the request never left the client
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The store rejected the request without applying it
    #[error("temporary failure")]
    TemporaryFailure,

    #[error("timed out (request sent: {sent})")]
    TimedOut { sent: bool },

    #[error("connection closed (request sent: {sent}): {reason}")]
    ConnectionClosed { sent: bool, reason: String },
}

impl TransportError {
    /// Whether the store might have received and applied the request.
    pub fn request_may_have_been_applied(&self) -> bool {
        match self {
            TransportError::ConnectFailed(_) | TransportError::TemporaryFailure => false,
            TransportError::TimedOut { sent } => *sent,
            TransportError::ConnectionClosed { sent, .. } => *sent,
        }
    }
}

impl Error {
    /// Key the failed operation targeted, if the error is key-scoped.
    pub fn key(&self) -> Option<&str> {
        match self {
            Error::NotFound { key }
            | Error::KeyExists { key }
            | Error::CasMismatch { key, .. }
            | Error::RetriesExhausted { key, .. }
            | Error::DurabilityTimeout { key, .. }
            | Error::DurabilityImpossible { key, .. }
            | Error::PathNotFound { key, .. }
            | Error::PathExists { key, .. }
            | Error::PathMismatch { key, .. }
            | Error::DeltaRange { key, .. }
            | Error::ValueTooLarge { key }
            | Error::AmbiguousOutcome { key, .. }
            | Error::Timeout { key, .. }
            | Error::Transport { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Transient failures a caller may simply try again.
    ///
    /// CAS mismatches are deliberately excluded: retrying them blindly would
    /// overwrite a concurrent writer. Use [`crate::CasRetryController`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport { .. } | Error::Timeout { .. })
    }

    /// The store may or may not hold the effects of the failed call.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Error::AmbiguousOutcome { .. })
    }
}
