//! Transport seam and in-process loopback implementation

use crate::error::FederationError;
use crate::message::{FederationRequest, FederationResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Client side of the federation channel.
///
/// A wire implementation blocks until the correlated response or a
/// transport-level failure arrives; transport failures surface as
/// [`FederationError::PeerUnavailable`], distinct from any error the
/// peer itself returned.
#[async_trait]
pub trait FederationTransport: Send + Sync {
    async fn call(
        &self,
        provider_id: &str,
        request: FederationRequest,
    ) -> Result<FederationResponse, FederationError>;
}

/// Server side: whatever accepts inbound federation requests for a
/// provider. The engine's remote facade implements this.
#[async_trait]
pub trait FederationHandler: Send + Sync {
    /// `caller_provider` is the authenticated identity of the sending
    /// provider, established by the transport.
    async fn handle(
        &self,
        caller_provider: &str,
        request: FederationRequest,
    ) -> Result<FederationResponse, FederationError>;
}

/// In-process transport connecting brokers inside one process.
///
/// Used by the integration tests to wire two brokers together, and by
/// the daemon when no wire transport is configured (every call then
/// fails with `PeerUnavailable`). Peers can be detached to simulate an
/// unreachable provider.
pub struct LoopbackTransport {
    local_provider: String,
    peers: RwLock<HashMap<String, Arc<dyn FederationHandler>>>,
}

impl LoopbackTransport {
    pub fn new(local_provider: impl Into<String>) -> Self {
        Self {
            local_provider: local_provider.into(),
            peers: RwLock::new(HashMap::new()),
        }
    }

    pub fn attach_peer(&self, provider_id: impl Into<String>, handler: Arc<dyn FederationHandler>) {
        self.peers
            .write()
            .expect("loopback peer table poisoned")
            .insert(provider_id.into(), handler);
    }

    /// Remove a peer, making subsequent calls to it fail as
    /// unreachable.
    pub fn detach_peer(&self, provider_id: &str) -> Option<Arc<dyn FederationHandler>> {
        self.peers
            .write()
            .expect("loopback peer table poisoned")
            .remove(provider_id)
    }
}

#[async_trait]
impl FederationTransport for LoopbackTransport {
    async fn call(
        &self,
        provider_id: &str,
        request: FederationRequest,
    ) -> Result<FederationResponse, FederationError> {
        let handler = {
            let peers = self.peers.read().expect("loopback peer table poisoned");
            peers.get(provider_id).cloned()
        };
        let handler = handler.ok_or_else(|| {
            FederationError::PeerUnavailable(format!("no channel to provider {provider_id}"))
        })?;
        tracing::trace!(
            peer = provider_id,
            method = request.method(),
            "loopback federation call"
        );
        handler.handle(&self.local_provider, request).await
    }
}
