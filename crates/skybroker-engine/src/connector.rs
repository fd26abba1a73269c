//! Cloud connector: local vs remote dispatch
//!
//! Every backend operation on an order goes through a connector. The
//! [`ConnectorFactory`] picks the variant per call from the order's
//! provider, never caching the decision on the order, so a change in
//! peer topology is honored immediately.
//!
//! Connectors never mutate order state; classification of their errors
//! and the resulting transitions are the processors' job.

use crate::registry::OrderRegistry;
use skybroker_cloud::PluginRegistry;
use skybroker_core::{
    BrokerError, InstanceState, Order, OrderSpec, Result,
};
use skybroker_federation::{
    FederationRequest, FederationResponse, FederationTransport, OrderEvent,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Normalized view of one backend instance.
#[derive(Debug, Clone)]
pub struct InstanceSnapshot {
    pub instance_id: Option<String>,
    pub state: InstanceState,
    pub attributes: HashMap<String, serde_json::Value>,
}

pub struct ConnectorFactory {
    local_provider_id: String,
    plugins: Arc<PluginRegistry>,
    transport: Arc<dyn FederationTransport>,
    registry: Arc<OrderRegistry>,
}

impl ConnectorFactory {
    pub fn new(
        local_provider_id: impl Into<String>,
        plugins: Arc<PluginRegistry>,
        transport: Arc<dyn FederationTransport>,
        registry: Arc<OrderRegistry>,
    ) -> Self {
        Self {
            local_provider_id: local_provider_id.into(),
            plugins,
            transport,
            registry,
        }
    }

    /// Resolve the connector for one call.
    pub fn connector_for(&self, order: &Order) -> CloudConnector {
        if order.is_local(&self.local_provider_id) {
            CloudConnector::Local(LocalConnector {
                plugins: self.plugins.clone(),
                registry: self.registry.clone(),
            })
        } else {
            CloudConnector::Remote(RemoteConnector {
                transport: self.transport.clone(),
                peer: order.provider.clone(),
            })
        }
    }

    pub fn local_provider_id(&self) -> &str {
        &self.local_provider_id
    }

    /// Push an out-of-band event to the provider that requested
    /// `order`. No-op for locally requested orders.
    pub async fn notify_requester(&self, order: &Order, event: OrderEvent) -> Result<()> {
        if order.requesting_provider == self.local_provider_id {
            return Ok(());
        }
        let request = FederationRequest::NotifyEvent {
            order_id: order.id,
            event,
        };
        match self.transport.call(&order.requesting_provider, request).await {
            Ok(_) => Ok(()),
            // The requester no longer tracks the order; nothing to
            // tell it.
            Err(skybroker_federation::FederationError::OrderNotFound(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

pub enum CloudConnector {
    Local(LocalConnector),
    Remote(RemoteConnector),
}

impl CloudConnector {
    /// Dispatch the order to its backend. Returns the backend-assigned
    /// instance id for local orders; a remote create returns `None`
    /// because the owning peer assigns the id and the remote sync
    /// processor mirrors it back later.
    pub async fn request_instance(&self, order: &Order) -> Result<Option<String>> {
        match self {
            CloudConnector::Local(local) => local.request_instance(order).await.map(Some),
            CloudConnector::Remote(remote) => {
                remote.create_order(order).await?;
                Ok(None)
            }
        }
    }

    pub async fn get_instance(&self, order: &Order) -> Result<InstanceSnapshot> {
        match self {
            CloudConnector::Local(local) => local.get_instance(order).await,
            CloudConnector::Remote(remote) => {
                let snapshot = remote.get_order(order).await?;
                Ok(InstanceSnapshot {
                    instance_id: snapshot.instance_id,
                    state: snapshot.cached_instance_state,
                    attributes: HashMap::new(),
                })
            }
        }
    }

    /// Idempotent: a backend that no longer knows the instance reports
    /// success.
    pub async fn delete_instance(&self, order: &Order) -> Result<()> {
        match self {
            CloudConnector::Local(local) => local.delete_instance(order).await,
            CloudConnector::Remote(remote) => remote.delete_order(order).await,
        }
    }

    /// Authoritative order snapshot from the owning peer. Only valid
    /// on the remote variant.
    pub async fn get_remote_order(&self, order: &Order) -> Result<Order> {
        match self {
            CloudConnector::Local(_) => Err(BrokerError::Internal(
                "get_remote_order called on a local connector".to_string(),
            )),
            CloudConnector::Remote(remote) => remote.get_order(order).await,
        }
    }
}

/// Invokes the plugin capability registered for the order's resource
/// type under the named cloud.
pub struct LocalConnector {
    plugins: Arc<PluginRegistry>,
    registry: Arc<OrderRegistry>,
}

impl LocalConnector {
    async fn request_instance(&self, order: &Order) -> Result<String> {
        let plugin = self.plugins.resource(&order.cloud_name, order.kind())?;
        let resolved = self.resolve_dependencies(order).await?;
        plugin.request_instance(&resolved, &order.owner).await
    }

    async fn get_instance(&self, order: &Order) -> Result<InstanceSnapshot> {
        let plugin = self.plugins.resource(&order.cloud_name, order.kind())?;
        let normalizer = self.plugins.normalizer(&order.cloud_name)?;
        let instance = plugin.get_instance(order, &order.owner).await?;
        let state = normalizer.normalize(order.kind(), &instance.cloud_status);
        Ok(InstanceSnapshot {
            instance_id: Some(instance.instance_id),
            state,
            attributes: instance.attributes,
        })
    }

    async fn delete_instance(&self, order: &Order) -> Result<()> {
        let plugin = self.plugins.resource(&order.cloud_name, order.kind())?;
        match plugin.delete_instance(order, &order.owner).await {
            // Already gone counts as deleted.
            Err(BrokerError::InstanceNotFound(_)) | Ok(()) => Ok(()),
            Err(other) => Err(other),
        }
    }

    /// The order model carries broker-level ids; plugins need the
    /// cloud-native ones. Resolution happens on a copy so the tracked
    /// order keeps its broker-level payload.
    ///
    /// A dependency order that does not exist is a permanent
    /// rejection; one that exists but has not been accepted yet is
    /// transient, so the dependent order retries until its dependency
    /// comes up.
    async fn resolve_dependencies(&self, order: &Order) -> Result<Order> {
        match &order.spec {
            OrderSpec::Attachment(spec) => {
                let compute_instance_id = self.instance_id_of(order, spec.compute_order_id).await?;
                let volume_instance_id = self.instance_id_of(order, spec.volume_order_id).await?;
                let mut resolved = order.clone();
                resolved.spec = OrderSpec::Attachment(skybroker_core::AttachmentSpec {
                    compute_instance_id: Some(compute_instance_id),
                    volume_instance_id: Some(volume_instance_id),
                    ..spec.clone()
                });
                Ok(resolved)
            }
            OrderSpec::PublicIp(spec) => {
                let compute_instance_id = self.instance_id_of(order, spec.compute_order_id).await?;
                let mut resolved = order.clone();
                resolved.spec = OrderSpec::PublicIp(skybroker_core::PublicIpSpec {
                    compute_instance_id: Some(compute_instance_id),
                    ..spec.clone()
                });
                Ok(resolved)
            }
            _ => Ok(order.clone()),
        }
    }

    async fn instance_id_of(
        &self,
        dependent: &Order,
        dependency_id: skybroker_core::OrderId,
    ) -> Result<String> {
        let handle = self.registry.get(dependency_id).ok_or_else(|| {
            BrokerError::Permanent(format!(
                "order {} depends on unknown order {dependency_id}",
                dependent.id
            ))
        })?;
        let dependency = handle.lock().await;
        dependency.instance_id.clone().ok_or_else(|| {
            BrokerError::Transient(format!(
                "dependency order {dependency_id} has no instance yet"
            ))
        })
    }
}

/// Forwards the operation over the federation protocol to the owning
/// peer, blocking until the correlated response or a transport error.
pub struct RemoteConnector {
    transport: Arc<dyn FederationTransport>,
    peer: String,
}

impl RemoteConnector {
    async fn create_order(&self, order: &Order) -> Result<()> {
        let request = FederationRequest::CreateOrder {
            order: order.clone(),
        };
        match self.transport.call(&self.peer, request).await {
            Ok(_) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_order(&self, order: &Order) -> Result<Order> {
        let request = FederationRequest::GetOrder {
            order_id: order.id,
            user: order.owner.clone(),
        };
        match self.transport.call(&self.peer, request).await {
            Ok(FederationResponse::Order(snapshot)) => Ok(snapshot),
            Ok(other) => Err(BrokerError::ProtocolViolation(format!(
                "peer {} answered get_order with {other:?}",
                self.peer
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_order(&self, order: &Order) -> Result<()> {
        let request = FederationRequest::DeleteOrder {
            order_id: order.id,
            user: order.owner.clone(),
        };
        match self.transport.call(&self.peer, request).await {
            Ok(_) => Ok(()),
            // The peer no longer tracks the order: nothing left to
            // delete.
            Err(skybroker_federation::FederationError::OrderNotFound(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
