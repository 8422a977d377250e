//! Sub-document path engine.
//!
//! Paths are parsed client-side for early validation and evaluated store-side
//! against the stored JSON, so only the addressed fragments cross the wire.

mod engine;
mod path;
mod spec;

pub use engine::*;
pub use path::*;
pub use spec::*;


use serde::Deserialize;
use serde::Serialize;

use crate::Error;

/// Failure of a single path operation.
///
/// Carried inside response frames, so it stays free of the key; the
/// dispatcher attaches key and path when it lifts it into [`Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum PathError {
    #[error("path not found")]
    NotFound,

    #[error("path already exists")]
    Exists,

    #[error("path mismatch: {0}")]
    Mismatch(String),

    #[error("invalid path: {0}")]
    Invalid(String),

    #[error("delta out of range")]
    DeltaRange,

    #[error("invalid value: {0}")]
    ValueInvalid(String),
}

impl PathError {
    pub fn into_error(
        self,
        key: &str,
        path: &str,
    ) -> Error {
        let key = key.to_string();
        let path = path.to_string();
        match self {
            PathError::NotFound => Error::PathNotFound { key, path },
            PathError::Exists => Error::PathExists { key, path },
            PathError::Mismatch(reason) => Error::PathMismatch { key, path, reason },
            PathError::Invalid(reason) => Error::PathInvalid { path, reason },
            PathError::DeltaRange => Error::DeltaRange { key, path },
            PathError::ValueInvalid(reason) => Error::InvalidArgument(format!("value for '{path}' in {key}: {reason}")),
        }
    }
}
