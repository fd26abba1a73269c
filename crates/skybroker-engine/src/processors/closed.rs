//! Closed-order cleanup
//!
//! Orders reaching Closed stay in the registry until their backend
//! instance is gone. Each pass deletes the instance (idempotently,
//! so a retried pass is safe) and then removes the order from both
//! storage and the registry. A failed delete leaves the order in
//! Closed for the next pass.

use super::ProcessorContext;
use crate::registry::OrderHandle;
use skybroker_core::OrderState;
use skybroker_federation::OrderEvent;
use std::sync::Arc;
use std::time::Duration;

pub struct ClosedProcessor {
    ctx: Arc<ProcessorContext>,
    interval: Duration,
}

impl ClosedProcessor {
    pub fn new(ctx: Arc<ProcessorContext>, interval: Duration) -> Self {
        Self { ctx, interval }
    }

    pub async fn run(self) {
        tracing::info!("closed processor started");
        loop {
            self.pass().await;
            if self.ctx.must_stop() {
                break;
            }
            tokio::time::sleep(self.interval).await;
        }
        tracing::info!("closed processor stopped");
    }

    pub async fn pass(&self) {
        while let Some(handle) = self.ctx.registry.next_in_state(OrderState::Closed) {
            self.process(&handle).await;
        }
        self.ctx.registry.reset_cursor(OrderState::Closed);
    }

    async fn process(&self, handle: &Arc<OrderHandle>) {
        let order = handle.lock().await;
        if order.order_state != OrderState::Closed {
            return;
        }

        // The instance of a remote order is deleted by its owning
        // peer; the local mirror just leaves the registry.
        if order.is_local(self.ctx.local_provider_id()) && order.instance_id.is_some() {
            let connector = self.ctx.connectors.connector_for(&order);
            if let Err(err) = connector.delete_instance(&order).await {
                tracing::warn!(
                    order_id = %order.id,
                    error = %err,
                    "instance cleanup failed, will retry"
                );
                return;
            }
        }

        // Tell the requesting peer, if any, that its mirror can close.
        // Best effort: the requester stays parked until a later pass
        // gets through.
        if let Err(err) = self
            .ctx
            .connectors
            .notify_requester(&order, OrderEvent::Closed)
            .await
        {
            tracing::warn!(
                order_id = %order.id,
                requester = %order.requesting_provider,
                error = %err,
                "could not notify requester of closure, will retry"
            );
            return;
        }

        if let Err(err) = self.ctx.storage.remove(order.id).await {
            tracing::error!(order_id = %order.id, error = %err, "storage removal failed");
            return;
        }
        if let Err(err) = self.ctx.registry.remove(&order) {
            tracing::error!(order_id = %order.id, error = %err, "registry removal failed");
            return;
        }
        tracing::info!(order_id = %order.id, "order closed and cleaned up");
    }
}
