//! In-process document store.
//!
//! Speaks the same frames as a remote store: mints cas values and mutation
//! tokens, evaluates sub-document specs atomically and reports replica
//! progress for durability polling. Node outages, stalled persistence,
//! failovers and temporary failures can be injected to exercise the client
//! paths that depend on them.

mod store;
mod transport;

pub use store::*;
pub use transport::*;
