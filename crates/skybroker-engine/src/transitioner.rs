//! State transitioner: the single entry point for state changes
//!
//! Every processor, the controller and the remote facade change order
//! state through [`StateTransitioner::transition`] only; nothing else
//! writes `order_state`. The new state is persisted before the
//! in-memory move, so a storage failure surfaces to the caller instead
//! of silently advancing memory ahead of the durable log.

use crate::registry::OrderRegistry;
use skybroker_core::{Order, OrderState, Result, StableStorage};
use std::sync::Arc;

pub struct StateTransitioner {
    registry: Arc<OrderRegistry>,
    storage: Arc<dyn StableStorage>,
}

impl StateTransitioner {
    pub fn new(registry: Arc<OrderRegistry>, storage: Arc<dyn StableStorage>) -> Self {
        Self { registry, storage }
    }

    /// Move a tracked order to `new_state`. The caller must hold the
    /// order's own lock; `order` is the guarded data.
    pub async fn transition(&self, order: &mut Order, new_state: OrderState) -> Result<()> {
        let old_state = order.order_state;
        if old_state == new_state {
            return Ok(());
        }

        // Write-through: persist first, then mutate memory. A replayed
        // write after a crash is harmless, the storage is an
        // at-least-once log.
        let mut persisted = order.clone();
        persisted.order_state = new_state;
        self.storage.update(&persisted, true).await?;

        self.registry.move_to_state(order, new_state)?;
        tracing::debug!(
            order_id = %order.id,
            from = %old_state,
            to = %new_state,
            "order state transition"
        );
        Ok(())
    }

    /// Persist non-state field changes (instance id, cached state,
    /// fault message) without relocating the order.
    pub async fn persist(&self, order: &Order) -> Result<()> {
        self.storage.update(order, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use skybroker_core::{
        BrokerError, ComputeSpec, OrderId, OrderSpec, SystemUser,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FlakyStorage {
        fail: AtomicBool,
    }

    #[async_trait]
    impl StableStorage for FlakyStorage {
        async fn add(&self, _order: &Order) -> Result<()> {
            Ok(())
        }

        async fn update(&self, _order: &Order, _state_changed: bool) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                Err(BrokerError::Storage("disk full".to_string()))
            } else {
                Ok(())
            }
        }

        async fn active_orders(&self, _state: OrderState) -> Result<Vec<Order>> {
            Ok(Vec::new())
        }

        async fn remove(&self, _id: OrderId) -> Result<()> {
            Ok(())
        }
    }

    fn order() -> Order {
        Order::new(
            OrderSpec::Compute(ComputeSpec {
                vcpus: 1,
                memory_mb: 512,
                disk_gb: 5,
                image_id: "img".to_string(),
                user_data: None,
            }),
            SystemUser::new("alice", "tok"),
            "provider-a",
            "provider-a",
            "default",
        )
    }

    #[tokio::test]
    async fn storage_failure_leaves_memory_unchanged() {
        let registry = Arc::new(OrderRegistry::new("provider-a"));
        let storage = Arc::new(FlakyStorage::default());
        let transitioner = StateTransitioner::new(registry.clone(), storage.clone());

        let handle = registry.add(order()).unwrap();
        storage.fail.store(true, Ordering::SeqCst);

        let mut guard = handle.lock().await;
        let err = transitioner
            .transition(&mut guard, OrderState::Spawning)
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Storage(_)));
        assert_eq!(guard.order_state, OrderState::Open);
        drop(guard);
        assert_eq!(registry.queue_len(OrderState::Open), 1);
        assert_eq!(registry.queue_len(OrderState::Spawning), 0);
    }

    #[tokio::test]
    async fn same_state_transition_is_a_no_op() {
        let registry = Arc::new(OrderRegistry::new("provider-a"));
        let storage = Arc::new(FlakyStorage::default());
        let transitioner = StateTransitioner::new(registry.clone(), storage.clone());

        let handle = registry.add(order()).unwrap();
        // Even a failing store cannot break a no-op transition.
        storage.fail.store(true, Ordering::SeqCst);

        let mut guard = handle.lock().await;
        transitioner
            .transition(&mut guard, OrderState::Open)
            .await
            .unwrap();
        assert_eq!(guard.order_state, OrderState::Open);
    }
}
