use std::time::Duration;

// -
// Keys and payloads

/// Longest key the store accepts, in bytes.
pub const MAX_KEY_LEN: usize = 250;

/// Largest document body the store accepts.
pub const MAX_DOCUMENT_SIZE: usize = 20 * 1024 * 1024;

/// Longest expiry a document may be given.
pub const MAX_EXPIRY: Duration = Duration::from_secs(50 * 365 * 24 * 60 * 60);

/// Format flags attached to JSON documents.
pub const JSON_FLAGS: u32 = 0x0200_0006;

/// Format flags attached to opaque binary documents.
pub const BINARY_FLAGS: u32 = 0x0300_0000;

// -
// Sub-document

/// Deepest path the sub-document engine resolves.
pub const MAX_PATH_DEPTH: usize = 32;

/// Most specs a single lookup_in / mutate_in may carry.
pub const MAX_SUBDOC_SPECS: usize = 16;

// -
// Embedded store

/// Partitions (vbuckets) a key space is split into.
pub const DEFAULT_PARTITION_COUNT: u16 = 64;
