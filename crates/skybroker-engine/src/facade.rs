//! Remote facade: the inbound side of the federation protocol
//!
//! Applies requests from peer providers against the local registry and
//! plugins, mirroring the logic a local user request would trigger.
//! Every inbound call re-validates that the target order's
//! authoritative owner really is this provider (or, for event
//! notifications, the calling peer), so misrouted or spoofed requests
//! die here without touching the registry. Calls are single-hop: the
//! caller must be the provider named on the order, peers-of-peers are
//! rejected.

use crate::controller::OrderController;
use crate::registry::OrderRegistry;
use crate::transitioner::StateTransitioner;
use async_trait::async_trait;
use skybroker_cloud::PluginRegistry;
use skybroker_core::{Order, OrderId, OrderState, ResourceKind, SystemUser};
use skybroker_federation::{
    FederationError, FederationHandler, FederationRequest, FederationResponse, OrderEvent,
};
use std::sync::Arc;

pub struct RemoteFacade {
    local_provider_id: String,
    registry: Arc<OrderRegistry>,
    transitioner: Arc<StateTransitioner>,
    controller: Arc<OrderController>,
    plugins: Arc<PluginRegistry>,
}

impl RemoteFacade {
    pub fn new(
        registry: Arc<OrderRegistry>,
        transitioner: Arc<StateTransitioner>,
        controller: Arc<OrderController>,
        plugins: Arc<PluginRegistry>,
    ) -> Self {
        Self {
            local_provider_id: registry.local_provider_id().to_string(),
            registry,
            transitioner,
            controller,
            plugins,
        }
    }

    async fn create_order(
        &self,
        caller: &str,
        order: Order,
    ) -> Result<FederationResponse, FederationError> {
        if order.provider != self.local_provider_id {
            return Err(FederationError::WrongProvider);
        }
        if order.requesting_provider != caller {
            return Err(FederationError::Protocol(format!(
                "order names requesting provider {} but arrived from {caller}",
                order.requesting_provider
            )));
        }
        self.controller.activate_order(order).await?;
        Ok(FederationResponse::Accepted)
    }

    async fn delete_order(
        &self,
        caller: &str,
        order_id: OrderId,
        user: &SystemUser,
    ) -> Result<FederationResponse, FederationError> {
        self.check_inbound_target(caller, order_id)?;
        self.controller.delete_order(order_id, user).await?;
        Ok(FederationResponse::Accepted)
    }

    async fn get_order(
        &self,
        caller: &str,
        order_id: OrderId,
        user: &SystemUser,
    ) -> Result<FederationResponse, FederationError> {
        self.check_inbound_target(caller, order_id)?;
        let order = self.controller.get_order(order_id, user).await?;
        Ok(FederationResponse::Order(order))
    }

    /// The calling peer owns the order and informs us, the requester,
    /// of an out-of-band event on it.
    async fn notify_event(
        &self,
        caller: &str,
        order_id: OrderId,
        event: OrderEvent,
    ) -> Result<FederationResponse, FederationError> {
        let handle = self
            .registry
            .get(order_id)
            .ok_or(FederationError::OrderNotFound(order_id))?;
        if handle.provider() != caller {
            return Err(FederationError::WrongProvider);
        }
        if handle.requesting_provider() != self.local_provider_id {
            return Err(FederationError::Protocol(
                "event for an order this provider did not request".to_string(),
            ));
        }

        let mut order = handle.lock().await;
        match event {
            OrderEvent::Closed => {
                self.transitioner
                    .transition(&mut order, OrderState::Closed)
                    .await?;
            }
            OrderEvent::InstanceFailed => {
                order.set_fault_message_once("owning provider reported instance failure");
                self.transitioner
                    .transition(&mut order, OrderState::FailedAfterSuccessfulRequest)
                    .await?;
            }
        }
        Ok(FederationResponse::Accepted)
    }

    async fn security_rule_target(
        &self,
        caller: &str,
        order_id: OrderId,
        user: &SystemUser,
    ) -> Result<Order, FederationError> {
        self.check_inbound_target(caller, order_id)?;
        let order = self.controller.get_order(order_id, user).await?;
        match order.kind() {
            ResourceKind::Network | ResourceKind::PublicIp => Ok(order),
            other => Err(FederationError::Protocol(format!(
                "security rules apply to network or public ip orders, not {other}"
            ))),
        }
    }

    /// Inbound order operations must target an order this provider
    /// owns and which the calling peer requested.
    fn check_inbound_target(&self, caller: &str, order_id: OrderId) -> Result<(), FederationError> {
        let handle = self
            .registry
            .get(order_id)
            .ok_or(FederationError::OrderNotFound(order_id))?;
        if handle.provider() != self.local_provider_id {
            return Err(FederationError::WrongProvider);
        }
        if handle.requesting_provider() != caller {
            return Err(FederationError::RequesterDoesNotOwnOrder);
        }
        Ok(())
    }
}

#[async_trait]
impl FederationHandler for RemoteFacade {
    async fn handle(
        &self,
        caller_provider: &str,
        request: FederationRequest,
    ) -> Result<FederationResponse, FederationError> {
        tracing::debug!(
            caller = caller_provider,
            method = request.method(),
            "inbound federation request"
        );
        match request {
            FederationRequest::CreateOrder { order } => {
                self.create_order(caller_provider, order).await
            }
            FederationRequest::DeleteOrder { order_id, user } => {
                self.delete_order(caller_provider, order_id, &user).await
            }
            FederationRequest::GetOrder { order_id, user } => {
                self.get_order(caller_provider, order_id, &user).await
            }
            FederationRequest::NotifyEvent { order_id, event } => {
                self.notify_event(caller_provider, order_id, event).await
            }
            FederationRequest::GetAllImages { cloud_name, user } => {
                let plugin = self.plugins.images(&cloud_name).map_err(FederationError::from)?;
                let images = plugin.list_images(&user).await?;
                Ok(FederationResponse::Images(images))
            }
            FederationRequest::GetImage {
                cloud_name,
                image_id,
                user,
            } => {
                let plugin = self.plugins.images(&cloud_name).map_err(FederationError::from)?;
                let image = plugin.get_image(&image_id, &user).await?;
                Ok(FederationResponse::Image(image))
            }
            FederationRequest::GetUserQuota {
                cloud_name,
                kind,
                user,
            } => {
                let plugin = self.plugins.quotas(&cloud_name).map_err(FederationError::from)?;
                let quota = plugin.user_quota(kind, &user).await?;
                Ok(FederationResponse::Quota(quota))
            }
            FederationRequest::CreateSecurityRule {
                target_order_id,
                rule,
                user,
            } => {
                let target = self
                    .security_rule_target(caller_provider, target_order_id, &user)
                    .await?;
                let plugin = self
                    .plugins
                    .security_rules(&target.cloud_name)
                    .map_err(FederationError::from)?;
                let rule_id = plugin.create_rule(&target, &rule, &user).await?;
                Ok(FederationResponse::SecurityRuleId(rule_id))
            }
            FederationRequest::DeleteSecurityRule {
                target_order_id,
                rule_id,
                user,
            } => {
                let target = self
                    .security_rule_target(caller_provider, target_order_id, &user)
                    .await?;
                let plugin = self
                    .plugins
                    .security_rules(&target.cloud_name)
                    .map_err(FederationError::from)?;
                plugin.delete_rule(&target, &rule_id, &user).await?;
                Ok(FederationResponse::Accepted)
            }
            FederationRequest::GetAllSecurityRules {
                target_order_id,
                user,
            } => {
                let target = self
                    .security_rule_target(caller_provider, target_order_id, &user)
                    .await?;
                let plugin = self
                    .plugins
                    .security_rules(&target.cloud_name)
                    .map_err(FederationError::from)?;
                let rules = plugin.list_rules(&target, &user).await?;
                Ok(FederationResponse::SecurityRules(rules))
            }
        }
    }
}
