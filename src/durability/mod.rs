//! Durability levels and the tracker that waits for them.
//!
//! The store acknowledges a write as soon as the active node applied it.
//! Stronger guarantees are confirmed afterwards by polling the partition's
//! replication and persistence progress.

mod level;
mod tracker;

pub use level::*;
pub use tracker::*;
