//! Client core of a distributed document store.
//!
//! - [`OperationDispatcher`] turns key-value and sub-document operations into
//!   round trips over a [`Transport`], retrying transient failures with
//!   bounded backoff.
//! - [`CasRetryController`] runs optimistic read-modify-write cycles.
//! - [`DurabilityTracker`] waits until a write reached a [`DurabilityLevel`].
//! - [`subdoc`] parses paths and evaluates them against JSON documents.
//!
//! ```rust,ignore
//! let store = Arc::new(EmbeddedStore::default());
//! let client = Client::builder(Arc::new(EmbeddedTransport::new(store))).build()?;
//! let count = client
//!     .counter_increment("counter-doc", "count", 1, DurabilityLevel::MajorityReplicated)
//!     .await?;
//! ```

mod blocking;
mod cas;
mod client;
mod config;
mod dispatcher;
mod document;
mod durability;
mod errors;
mod metrics;
mod network;

pub mod constants;
pub mod embedded;
pub mod protocol;
pub mod subdoc;
pub mod utils;

pub use blocking::*;
pub use cas::*;
pub use client::*;
pub use config::*;
pub use dispatcher::*;
pub use document::*;
pub use durability::*;
pub use errors::*;
pub use metrics::gather_metrics;
pub use metrics::register_custom_metrics;
pub use network::Transport;
pub use protocol::StoreSemantics;
pub use subdoc::LookupSpec;
pub use subdoc::MutateSpec;
