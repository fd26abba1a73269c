//! Remote order synchronization
//!
//! Local mirrors of orders fulfilled by a peer cannot be polled
//! against a backend; their authoritative state lives at the owning
//! provider. This processor walks the remote-orders queue, fetches the
//! authoritative snapshot from each order's peer and overwrites the
//! cached fields to match.
//!
//! Orders in FailedOnRequest and AssignedForDeletion are skipped:
//! nothing happening at the remote provider can change the former, and
//! the latter only moves when the peer explicitly signals closure.

use super::ProcessorContext;
use crate::registry::OrderHandle;
use skybroker_core::{BrokerError, OrderState};
use std::sync::Arc;
use std::time::Duration;

pub struct RemoteSyncProcessor {
    ctx: Arc<ProcessorContext>,
    interval: Duration,
}

impl RemoteSyncProcessor {
    pub fn new(ctx: Arc<ProcessorContext>, interval: Duration) -> Self {
        Self { ctx, interval }
    }

    pub async fn run(self) {
        tracing::info!("remote sync processor started");
        loop {
            self.pass().await;
            if self.ctx.must_stop() {
                break;
            }
            tokio::time::sleep(self.interval).await;
        }
        tracing::info!("remote sync processor stopped");
    }

    pub async fn pass(&self) {
        while let Some(handle) = self.ctx.registry.next_remote() {
            self.process(&handle).await;
        }
        self.ctx.registry.reset_remote_cursor();
    }

    async fn process(&self, handle: &Arc<OrderHandle>) {
        let mut order = handle.lock().await;
        if order.is_local(self.ctx.local_provider_id()) {
            // Only remote orders belong to this queue.
            tracing::error!(order_id = %order.id, "local order found in the remote queue");
            return;
        }
        if matches!(
            order.order_state,
            OrderState::FailedOnRequest | OrderState::AssignedForDeletion | OrderState::Closed
        ) {
            return;
        }

        let connector = self.ctx.connectors.connector_for(&order);
        match connector.get_remote_order(&order).await {
            Ok(remote) => {
                order.update_from_remote(&remote);
                if order.order_state != remote.order_state {
                    if let Err(err) = self
                        .ctx
                        .transitioner
                        .transition(&mut order, remote.order_state)
                        .await
                    {
                        tracing::error!(
                            order_id = %order.id,
                            error = %err,
                            "mirroring transition failed"
                        );
                    }
                } else if let Err(err) = self.ctx.transitioner.persist(&order).await {
                    tracing::error!(order_id = %order.id, error = %err, "mirror persist failed");
                }
            }
            Err(BrokerError::PeerUnavailable(msg)) => {
                tracing::warn!(
                    order_id = %order.id,
                    peer = %order.provider,
                    "owning peer unreachable: {msg}"
                );
                if order.order_state != OrderState::UnableToCheckStatus {
                    if let Err(err) = self
                        .ctx
                        .transitioner
                        .transition(&mut order, OrderState::UnableToCheckStatus)
                        .await
                    {
                        tracing::error!(order_id = %order.id, error = %err, "state transition failed");
                    }
                }
            }
            Err(err) => {
                // Peer-returned business errors do not change the
                // mirror; the next pass retries.
                tracing::warn!(order_id = %order.id, error = %err, "remote sync failed");
            }
        }
    }
}
