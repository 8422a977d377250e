use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use docstore_client::embedded::EmbeddedStore;
use docstore_client::embedded::EmbeddedTransport;
use docstore_client::protocol::Codec;
use docstore_client::protocol::Payload;
use docstore_client::protocol::Request;
use docstore_client::protocol::RequestFrame;
use docstore_client::BackoffPolicy;
use docstore_client::CasRetryConfig;
use docstore_client::Client;
use docstore_client::ClientConfig;
use docstore_client::Transport;
use docstore_client::TransportError;

/// Fast retries so fault tests stay short.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        retry: BackoffPolicy {
            max_attempts: 4,
            attempt_timeout_ms: 500,
            base_delay_ms: 1,
            max_delay_ms: 20,
            jitter: true,
        },
        cas: CasRetryConfig {
            max_attempts: 10,
            conflict_backoff_ms: 2,
        },
        ..ClientConfig::default()
    }
}

pub fn client_over(transport: impl Transport) -> Client {
    Client::builder(Arc::new(transport))
        .set_config(test_config())
        .build()
        .expect("valid test config")
}

/// A client talking to a fresh embedded store with three nodes.
pub fn embedded_client() -> (Arc<EmbeddedStore>, Client) {
    let store = Arc::new(EmbeddedStore::default());
    let client = client_over(EmbeddedTransport::new(store.clone()));
    (store, client)
}

fn decode(raw: &Bytes) -> Request {
    Codec::default()
        .decode_request(raw)
        .expect("client sends valid frames")
        .body
}

fn is_write(request: &Request) -> bool {
    !matches!(
        request,
        Request::Get { .. } | Request::Exists { .. } | Request::LookupIn { .. } | Request::Observe { .. }
    )
}

/// Delivers writes to the store but loses the response, as a connection
/// dropping right after the send would.
pub struct CutAfterSend {
    inner: EmbeddedTransport,
    remaining: AtomicU32,
}

impl CutAfterSend {
    pub fn new(
        store: Arc<EmbeddedStore>,
        cuts: u32,
    ) -> Self {
        Self {
            inner: EmbeddedTransport::new(store),
            remaining: AtomicU32::new(cuts),
        }
    }
}

#[async_trait]
impl Transport for CutAfterSend {
    async fn send(
        &self,
        request: Bytes,
    ) -> Result<Bytes, TransportError> {
        let write = is_write(&decode(&request));
        let response = self.inner.send(request).await?;
        if write
            && self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(TransportError::ConnectionClosed {
                sent: true,
                reason: "connection reset after send".into(),
            });
        }
        Ok(response)
    }
}

/// Refuses the first `failures` connection attempts outright.
pub struct FlakyConnect {
    inner: EmbeddedTransport,
    remaining: AtomicU32,
    pub attempts: AtomicU32,
}

impl FlakyConnect {
    pub fn new(
        store: Arc<EmbeddedStore>,
        failures: u32,
    ) -> Self {
        Self {
            inner: EmbeddedTransport::new(store),
            remaining: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Transport for FlakyConnect {
    async fn send(
        &self,
        request: Bytes,
    ) -> Result<Bytes, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::ConnectFailed("connection refused".into()));
        }
        self.inner.send(request).await
    }
}

/// Lets a competing writer overwrite the document right before each of the
/// first `conflicts` replaces, so their cas is stale on arrival.
pub struct ConflictInjector {
    inner: EmbeddedTransport,
    remaining: AtomicU32,
}

impl ConflictInjector {
    pub fn new(
        store: Arc<EmbeddedStore>,
        conflicts: u32,
    ) -> Self {
        Self {
            inner: EmbeddedTransport::new(store),
            remaining: AtomicU32::new(conflicts),
        }
    }
}

#[async_trait]
impl Transport for ConflictInjector {
    async fn send(
        &self,
        request: Bytes,
    ) -> Result<Bytes, TransportError> {
        if let Request::Replace { key, value, flags, .. } = decode(&request) {
            if self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                self.inner.store().handle(RequestFrame {
                    opaque: 0,
                    body: Request::Upsert {
                        key,
                        value: Payload::raw(value.data),
                        flags,
                        expiry: None,
                    },
                });
            }
        }
        self.inner.send(request).await
    }
}
