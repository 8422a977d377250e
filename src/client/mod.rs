//! Client entry point.
//!
//! [`Client`] bundles the dispatcher, the CAS retry helper and the
//! durability tracker over one shared transport and configuration. It is
//! created through [`ClientBuilder`].

mod builder;
pub use builder::*;


use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::network::RequestChannel;
use crate::protocol::Codec;
use crate::CasRetryController;
use crate::ClientConfig;
use crate::DurabilityTracker;
use crate::OperationDispatcher;
use crate::Transport;

/// State shared by every handle a [`Client`] hands out.
pub(crate) struct ClientInner {
    pub(crate) channel: Arc<RequestChannel>,
    pub(crate) config: ClientConfig,
    pub(crate) client_id: String,
}

impl ClientInner {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        client_id: String,
    ) -> Self {
        Self {
            channel: Arc::new(RequestChannel::new(transport, Codec::new(config.compression))),
            config,
            client_id,
        }
    }

    pub(crate) fn shared(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        client_id: String,
    ) -> Arc<ArcSwap<ClientInner>> {
        Arc::new(ArcSwap::from_pointee(Self::new(transport, config, client_id)))
    }
}

/// Main entry point for talking to the document store
///
/// Dereferences to [`OperationDispatcher`], so plain key-value and
/// sub-document calls can be made on the client directly:
///
/// ```rust,ignore
/// let client = Client::builder(transport).build()?;
/// client.upsert("user:1", r#"{"name":"ada"}"#, DurabilityLevel::None).await?;
/// let doc = client.get("user:1").await?;
/// ```
#[derive(Clone)]
pub struct Client {
    dispatcher: OperationDispatcher,
    cas: CasRetryController,
    durability: DurabilityTracker,
    inner: Arc<ArcSwap<ClientInner>>,
}

impl std::ops::Deref for Client {
    type Target = OperationDispatcher;

    fn deref(&self) -> &Self::Target {
        &self.dispatcher
    }
}

impl Client {
    /// Create a configured client builder over `transport`.
    pub fn builder(transport: Arc<dyn Transport>) -> ClientBuilder {
        ClientBuilder::new(transport)
    }

    pub(crate) fn from_inner(inner: Arc<ArcSwap<ClientInner>>) -> Self {
        let dispatcher = OperationDispatcher::new(inner.clone());
        Self {
            cas: CasRetryController::new(Arc::new(dispatcher.clone()), inner.load().config.cas),
            durability: DurabilityTracker::new(inner.clone()),
            dispatcher,
            inner,
        }
    }

    pub fn dispatcher(&self) -> &OperationDispatcher {
        &self.dispatcher
    }

    /// Read-modify-write helper with optimistic concurrency.
    pub fn cas(&self) -> &CasRetryController {
        &self.cas
    }

    pub fn durability(&self) -> &DurabilityTracker {
        &self.durability
    }

    pub fn client_id(&self) -> String {
        self.inner.load().client_id.clone()
    }

    pub fn config(&self) -> ClientConfig {
        self.inner.load().config.clone()
    }

    /// Swaps the transport for every handle of this client.
    ///
    /// Operations already in flight finish on the old transport.
    pub fn refresh(
        &self,
        transport: Arc<dyn Transport>,
    ) {
        let old_inner = self.inner.load();
        let new_inner = Arc::new(ClientInner::new(
            transport,
            old_inner.config.clone(),
            old_inner.client_id.clone(),
        ));
        tracing::info!("[:Client:refresh] client {} switched transport", old_inner.client_id);
        self.inner.store(new_inner);
    }
}
