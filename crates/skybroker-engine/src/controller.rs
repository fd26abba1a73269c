//! Order controller: the entry point for user-facing layers
//!
//! The REST/CLI surface and the remote facade both funnel into this
//! controller. It owns order activation, deletion and the query side;
//! everything it does is authorized upstream, so the only check left
//! here is that the caller actually owns the order it names.

use crate::connector::ConnectorFactory;
use crate::registry::OrderRegistry;
use crate::transitioner::StateTransitioner;
use skybroker_core::{
    BrokerError, InstanceState, Order, OrderId, OrderState, Result, StableStorage, SystemUser,
};
use std::sync::Arc;

pub struct OrderController {
    registry: Arc<OrderRegistry>,
    transitioner: Arc<StateTransitioner>,
    connectors: Arc<ConnectorFactory>,
    storage: Arc<dyn StableStorage>,
}

impl OrderController {
    pub fn new(
        registry: Arc<OrderRegistry>,
        transitioner: Arc<StateTransitioner>,
        connectors: Arc<ConnectorFactory>,
        storage: Arc<dyn StableStorage>,
    ) -> Self {
        Self {
            registry,
            transitioner,
            connectors,
            storage,
        }
    }

    /// Accept a new order into the broker: persist it, register it and
    /// queue it as Open for the dispatch processor.
    pub async fn activate_order(&self, mut order: Order) -> Result<OrderId> {
        order.order_state = OrderState::Open;
        order.instance_id = None;
        let id = order.id;
        self.storage.add(&order).await?;
        self.registry.add(order)?;
        tracing::info!(order_id = %id, "order activated");
        Ok(id)
    }

    /// Delete an order on the caller's behalf.
    ///
    /// Local orders go straight to Closed; the closed processor tears
    /// the instance down. For a remote order the owning peer is told
    /// to delete first, then the mirror parks in AssignedForDeletion
    /// until the peer signals closure.
    pub async fn delete_order(&self, id: OrderId, user: &SystemUser) -> Result<()> {
        let handle = self
            .registry
            .get(id)
            .ok_or(BrokerError::OrderNotFound(id))?;
        let mut order = handle.lock().await;
        if order.owner.id != user.id {
            return Err(BrokerError::UnauthorizedOwner);
        }
        if matches!(
            order.order_state,
            OrderState::Closed | OrderState::AssignedForDeletion
        ) {
            return Err(BrokerError::ProtocolViolation(format!(
                "order {id} is already being deleted"
            )));
        }

        if order.is_local(self.registry.local_provider_id()) {
            self.transitioner
                .transition(&mut order, OrderState::Closed)
                .await
        } else {
            let connector = self.connectors.connector_for(&order);
            connector.delete_instance(&order).await?;
            self.transitioner
                .transition(&mut order, OrderState::AssignedForDeletion)
                .await
        }
    }

    /// Snapshot of one order, for the caller that owns it.
    pub async fn get_order(&self, id: OrderId, user: &SystemUser) -> Result<Order> {
        let handle = self
            .registry
            .get(id)
            .ok_or(BrokerError::OrderNotFound(id))?;
        let order = handle.lock().await;
        if order.owner.id != user.id {
            return Err(BrokerError::UnauthorizedOwner);
        }
        Ok(order.clone())
    }

    /// Snapshots of all active orders the user owns.
    pub async fn orders_of_user(&self, user: &SystemUser) -> Vec<Order> {
        let mut snapshots = Vec::new();
        for handle in self.registry.orders_of_user(&user.id) {
            let order = handle.lock().await;
            snapshots.push(order.clone());
        }
        snapshots
    }

    /// Instance view of an order: the backend-assigned id (if any) and
    /// the canonical instance state, synthesized for orders that were
    /// never accepted by a backend.
    pub async fn instance_view(
        &self,
        id: OrderId,
        user: &SystemUser,
    ) -> Result<(Option<String>, InstanceState)> {
        let order = self.get_order(id, user).await?;
        Ok((order.instance_id.clone(), order.instance_state_view()))
    }
}
