//! Dispatch processor: Open and Pending queues
//!
//! Picks submitted orders off their queue and asks the cloud connector
//! to request an instance. One processor instance scans Open, a second
//! scans Pending for local retries.
//!
//! Retry policy (applied here, uniformly, not per plugin): resource
//! exhaustion and transient dispatch failures park the order in
//! Pending for retry; only an explicit permanent rejection reaches
//! FailedOnRequest.

use super::ProcessorContext;
use crate::registry::OrderHandle;
use skybroker_core::{BrokerError, Order, OrderState};
use std::sync::Arc;
use std::time::Duration;

pub struct DispatchProcessor {
    ctx: Arc<ProcessorContext>,
    source: OrderState,
    interval: Duration,
}

impl DispatchProcessor {
    /// Scans freshly submitted orders.
    pub fn open(ctx: Arc<ProcessorContext>, interval: Duration) -> Self {
        Self {
            ctx,
            source: OrderState::Open,
            interval,
        }
    }

    /// Retries local orders whose dispatch failed transiently.
    pub fn pending(ctx: Arc<ProcessorContext>, interval: Duration) -> Self {
        Self {
            ctx,
            source: OrderState::Pending,
            interval,
        }
    }

    pub async fn run(self) {
        tracing::info!(queue = %self.source, "dispatch processor started");
        loop {
            self.pass().await;
            if self.ctx.must_stop() {
                break;
            }
            tokio::time::sleep(self.interval).await;
        }
        tracing::info!(queue = %self.source, "dispatch processor stopped");
    }

    /// One full scan of the queue.
    pub async fn pass(&self) {
        while let Some(handle) = self.ctx.registry.next_in_state(self.source) {
            self.process(&handle).await;
        }
        self.ctx.registry.reset_cursor(self.source);
    }

    async fn process(&self, handle: &Arc<OrderHandle>) {
        let mut order = handle.lock().await;
        // The order may have moved since the cursor read it.
        if order.order_state != self.source {
            return;
        }
        // A remote order parked in Pending was already accepted by its
        // peer; the sync processor owns it from here.
        if self.source == OrderState::Pending
            && !order.is_local(self.ctx.local_provider_id())
        {
            return;
        }

        let connector = self.ctx.connectors.connector_for(&order);
        match connector.request_instance(&order).await {
            Ok(Some(instance_id)) => {
                order.instance_id = Some(instance_id);
                self.transition(&mut order, OrderState::Spawning).await;
            }
            Ok(None) => {
                // Accepted by the owning peer; wait for mirroring.
                self.transition(&mut order, OrderState::Pending).await;
            }
            Err(err) => self.handle_dispatch_error(&mut order, err).await,
        }
    }

    async fn handle_dispatch_error(&self, order: &mut Order, err: BrokerError) {
        match err {
            BrokerError::Permanent(_) | BrokerError::InstanceNotFound(_) => {
                tracing::warn!(order_id = %order.id, error = %err, "dispatch permanently rejected");
                order.set_fault_message_once(err.to_string());
                self.transition(order, OrderState::FailedOnRequest).await;
            }
            BrokerError::ResourceExhausted(_) => {
                tracing::warn!(order_id = %order.id, error = %err, "no capacity, will retry");
                if order.order_state == OrderState::Open {
                    self.transition(order, OrderState::Pending).await;
                }
            }
            BrokerError::Transient(_) => {
                tracing::warn!(order_id = %order.id, error = %err, "transient dispatch failure");
                if order.order_state == OrderState::Open {
                    self.transition(order, OrderState::Pending).await;
                }
            }
            BrokerError::PeerUnavailable(_) => {
                // Remote create could not reach the peer; the order
                // stays where it is and the next pass retries.
                tracing::warn!(order_id = %order.id, error = %err, "owning peer unreachable");
            }
            other => {
                // Unclassified: keep the loop alive, retry next pass.
                tracing::error!(order_id = %order.id, error = %other, "unexpected dispatch error");
            }
        }
    }

    async fn transition(&self, order: &mut Order, new_state: OrderState) {
        if let Err(err) = self.ctx.transitioner.transition(order, new_state).await {
            tracing::error!(
                order_id = %order.id,
                to = %new_state,
                error = %err,
                "state transition failed"
            );
        }
    }
}
