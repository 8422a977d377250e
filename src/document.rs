use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Version stamp of a stored document used for optimistic concurrency.
///
/// Opaque to the client: the only meaningful operation is equality. Every
/// successful mutation of a key yields a value distinct from all earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cas(pub u64);

impl Cas {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cas {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Identifies a mutation inside the store's replication stream.
///
/// The partition uuid changes when a partition fails over; a token issued
/// under an older uuid may refer to a mutation that was rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationToken {
    pub partition_id: u16,
    pub partition_uuid: u64,
    pub seqno: u64,
}

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationResult {
    pub cas: Cas,
    pub token: MutationToken,
}

/// Client-side snapshot of a stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub key: String,
    pub content: Bytes,
    pub cas: Cas,
    /// Remaining lifetime, `None` when the document never expires
    pub expiry: Option<Duration>,
    pub flags: u32,
}

impl Document {
    /// Decodes the content as JSON into `T`.
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.content)?)
    }
}
