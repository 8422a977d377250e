use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

use super::EmbeddedStore;
use crate::protocol::Codec;
use crate::Transport;
use crate::TransportError;

/// [`Transport`] that hands frames straight to an [`EmbeddedStore`].
#[derive(Clone)]
pub struct EmbeddedTransport {
    store: Arc<EmbeddedStore>,
    codec: Codec,
}

impl EmbeddedTransport {
    pub fn new(store: Arc<EmbeddedStore>) -> Self {
        Self {
            store,
            codec: Codec::default(),
        }
    }

    pub fn with_codec(
        store: Arc<EmbeddedStore>,
        codec: Codec,
    ) -> Self {
        Self { store, codec }
    }

    pub fn store(&self) -> &Arc<EmbeddedStore> {
        &self.store
    }
}

#[async_trait]
impl Transport for EmbeddedTransport {
    async fn send(
        &self,
        request: Bytes,
    ) -> std::result::Result<Bytes, TransportError> {
        // a store drops connections that deliver garbage
        let frame = self.codec.decode_request(&request).map_err(|e| {
            warn!("[:EmbeddedTransport:send] undecodable request: {}", e);
            TransportError::ConnectionClosed {
                sent: true,
                reason: e.to_string(),
            }
        })?;

        let response = self.store.handle(frame);
        self.codec.encode_response(response).map_err(|e| {
            warn!("[:EmbeddedTransport:send] unencodable response: {}", e);
            TransportError::ConnectionClosed {
                sent: true,
                reason: e.to_string(),
            }
        })
    }
}
