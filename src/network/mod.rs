//! Network seam between the client core and the store.
//!
//! Connection management, sockets and TLS live behind [`Transport`]; this
//! module only frames requests, assigns opaque ids and matches responses.

#[cfg(test)]
mod network_test;

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use tokio::time::timeout;
use tracing::trace;
use tracing::warn;

use crate::protocol::Codec;
use crate::protocol::Request;
use crate::protocol::RequestFrame;
use crate::protocol::ResponseFrame;
use crate::Error;
use crate::TransportError;

/// Moves encoded frames to the store and back.
///
/// Implementations may multiplex many requests over one connection and are
/// shared between concurrent operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one request frame and resolves with the matching response frame.
    ///
    /// The error must say whether the request may have reached the store;
    /// see [`TransportError::request_may_have_been_applied`].
    async fn send(
        &self,
        request: Bytes,
    ) -> std::result::Result<Bytes, TransportError>;
}

/// Why a single round trip failed.
#[derive(Debug)]
pub(crate) enum RoundTripError {
    /// Transient, classified by whether the request may have been applied
    Transport(TransportError),
    /// Encoding, decoding or pairing failure; never retried
    Frame(Error),
}

impl From<Error> for RoundTripError {
    fn from(e: Error) -> Self {
        RoundTripError::Frame(e)
    }
}

/// Pairs requests with responses over a shared transport.
pub(crate) struct RequestChannel {
    transport: Arc<dyn Transport>,
    codec: Codec,
    next_opaque: AtomicU32,
}

impl RequestChannel {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        codec: Codec,
    ) -> Self {
        Self {
            transport,
            codec,
            next_opaque: AtomicU32::new(1),
        }
    }

    /// Opaque ids wrap around; uniqueness only matters among in-flight requests.
    fn next_opaque(&self) -> u32 {
        self.next_opaque.fetch_add(1, Ordering::Relaxed)
    }

    /// One attempt: encode, send within `attempt_timeout`, decode and verify
    /// the response belongs to this request.
    pub(crate) async fn round_trip(
        &self,
        request: Request,
        attempt_timeout: Duration,
    ) -> std::result::Result<ResponseFrame, RoundTripError> {
        let opaque = self.next_opaque();
        let encoded = self.codec.encode_request(RequestFrame { opaque, body: request })?;
        trace!("[:RequestChannel:round_trip] opaque={} bytes={}", opaque, encoded.len());

        let raw = match timeout(attempt_timeout, self.transport.send(encoded)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!("[:RequestChannel:round_trip] opaque={} transport error: {}", opaque, e);
                return Err(RoundTripError::Transport(e));
            }
            Err(_) => {
                // the frame was handed to the transport, so it may be on the wire
                warn!(
                    "[:RequestChannel:round_trip] opaque={} timed out after {:?}",
                    opaque, attempt_timeout
                );
                return Err(RoundTripError::Transport(TransportError::TimedOut { sent: true }));
            }
        };

        let response = self.codec.decode_response(&raw)?;
        if response.opaque != opaque {
            return Err(RoundTripError::Frame(Error::Protocol(format!(
                "response opaque {} does not match request opaque {}",
                response.opaque, opaque
            ))));
        }
        Ok(response)
    }
}
