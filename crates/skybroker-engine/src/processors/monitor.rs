//! Instance monitor: Spawning, UnableToCheckStatus and Fulfilled queues
//!
//! Polls the backend for instances of local orders and advances the
//! order when the normalized state says so. Remote orders are owned by
//! their peer and must not be polled directly; one found in the
//! Spawning queue is a placement bug, mitigated by parking it in
//! Pending where the sync processor picks it up.

use super::ProcessorContext;
use crate::registry::OrderHandle;
use skybroker_core::{BrokerError, Order, OrderState, Result};
use skybroker_federation::OrderEvent;
use std::sync::Arc;
use std::time::Duration;

pub struct MonitorProcessor {
    ctx: Arc<ProcessorContext>,
    source: OrderState,
    /// Whether a ready instance advances the order to Fulfilled. The
    /// Fulfilled-queue instance only watches for late failures.
    promote_ready: bool,
    interval: Duration,
}

impl MonitorProcessor {
    /// Watches freshly accepted instances until they come up.
    pub fn spawning(ctx: Arc<ProcessorContext>, interval: Duration) -> Self {
        Self {
            ctx,
            source: OrderState::Spawning,
            promote_ready: true,
            interval,
        }
    }

    /// Rechecks local orders whose backend endpoint was unreachable
    /// on a poll. Remote mirrors parked in the same state are
    /// recovered by the sync processor, not here.
    pub fn status_recheck(ctx: Arc<ProcessorContext>, interval: Duration) -> Self {
        Self {
            ctx,
            source: OrderState::UnableToCheckStatus,
            promote_ready: true,
            interval,
        }
    }

    /// Watches fulfilled instances for failures happening after the
    /// instance was ready.
    pub fn fulfilled(ctx: Arc<ProcessorContext>, interval: Duration) -> Self {
        Self {
            ctx,
            source: OrderState::Fulfilled,
            promote_ready: false,
            interval,
        }
    }

    pub async fn run(self) {
        tracing::info!(queue = %self.source, "monitor processor started");
        loop {
            self.pass().await;
            if self.ctx.must_stop() {
                break;
            }
            tokio::time::sleep(self.interval).await;
        }
        tracing::info!(queue = %self.source, "monitor processor stopped");
    }

    pub async fn pass(&self) {
        while let Some(handle) = self.ctx.registry.next_in_state(self.source) {
            if let Err(err) = self.process(&handle).await {
                tracing::warn!(
                    order_id = %handle.id(),
                    error = %err,
                    "monitoring pass left order for recheck"
                );
            }
        }
        self.ctx.registry.reset_cursor(self.source);
    }

    async fn process(&self, handle: &Arc<OrderHandle>) -> Result<()> {
        let mut order = handle.lock().await;
        if order.order_state != self.source {
            return Ok(());
        }
        if !order.is_local(self.ctx.local_provider_id()) {
            if self.source == OrderState::Spawning {
                // Should never happen; self-heal the placement.
                tracing::warn!(
                    order_id = %order.id,
                    provider = %order.provider,
                    "remote order found in a local monitoring queue"
                );
                self.transition(&mut order, OrderState::Pending).await;
            }
            // Remote orders in other monitored states are legitimate
            // mirrors; the sync processor owns them.
            return Ok(());
        }

        let connector = self.ctx.connectors.connector_for(&order);
        match connector.get_instance(&order).await {
            Ok(snapshot) => {
                order.cached_instance_state = snapshot.state;
                if snapshot.state.has_failed() {
                    order.set_fault_message_once(format!(
                        "backend reported instance state {}",
                        snapshot.state
                    ));
                    self.transition(&mut order, OrderState::FailedAfterSuccessfulRequest)
                        .await;
                    self.notify_failure(&order).await;
                } else if snapshot.state.is_ready() && self.promote_ready {
                    self.transition(&mut order, OrderState::Fulfilled).await;
                } else if let Err(err) = self.ctx.transitioner.persist(&order).await {
                    tracing::error!(order_id = %order.id, error = %err, "cache persist failed");
                }
                Ok(())
            }
            Err(err @ BrokerError::PeerUnavailable(_)) => {
                if self.source != OrderState::UnableToCheckStatus {
                    self.transition(&mut order, OrderState::UnableToCheckStatus)
                        .await;
                }
                // Re-raise so the loop records the unreachable backend.
                Err(err)
            }
            Err(err @ (BrokerError::Permanent(_) | BrokerError::InstanceNotFound(_))) => {
                order.set_fault_message_once(err.to_string());
                self.transition(&mut order, OrderState::FailedAfterSuccessfulRequest)
                    .await;
                self.notify_failure(&order).await;
                Ok(())
            }
            Err(other) => {
                // Transient or unclassified: state untouched, retried.
                tracing::debug!(order_id = %order.id, error = %other, "instance poll failed");
                Ok(())
            }
        }
    }

    /// Best effort: the requesting peer also polls us, so a lost event
    /// only delays the mirror, it does not strand it.
    async fn notify_failure(&self, order: &Order) {
        if let Err(err) = self
            .ctx
            .connectors
            .notify_requester(order, OrderEvent::InstanceFailed)
            .await
        {
            tracing::warn!(
                order_id = %order.id,
                requester = %order.requesting_provider,
                error = %err,
                "could not notify requester of instance failure"
            );
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
