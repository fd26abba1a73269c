//! In-memory order registry and per-state work queues
//!
//! The registry owns two views of the same set: a map `id -> order`
//! holding every active order, and one cursor queue per order state
//! holding the subset currently in that state. A third queue tracks
//! all active orders fulfilled by a peer provider, spanning states,
//! for the remote synchronization processor.
//!
//! Queue membership always equals the order's `order_state`; every
//! relocation happens in a single critical section so a concurrent
//! reader never observes an order in neither or both queues. The
//! registry lock is never held across an await.
//!
//! The registry is constructed once at process start and shared by
//! reference with every processor; there is no global singleton.

use skybroker_core::{BrokerError, Order, OrderId, OrderState, ResourceKind, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

/// One tracked order: immutable routing metadata outside the lock,
/// everything mutable behind a per-order async mutex.
///
/// The per-order mutex is what serializes a user-initiated delete
/// against a processor's reconciliation pass on the same order.
pub struct OrderHandle {
    id: OrderId,
    kind: ResourceKind,
    provider: String,
    requesting_provider: String,
    cloud_name: String,
    owner_id: String,
    order: AsyncMutex<Order>,
}

impl OrderHandle {
    fn new(order: Order) -> Self {
        Self {
            id: order.id,
            kind: order.kind(),
            provider: order.provider.clone(),
            requesting_provider: order.requesting_provider.clone(),
            cloud_name: order.cloud_name.clone(),
            owner_id: order.owner.id.clone(),
            order: AsyncMutex::new(order),
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn requesting_provider(&self) -> &str {
        &self.requesting_provider
    }

    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn is_local(&self, local_provider_id: &str) -> bool {
        self.provider == local_provider_id
    }

    /// Acquire the per-order lock. Held for the whole of a reconcile
    /// or delete, never across queue scans of other orders.
    pub async fn lock(&self) -> MutexGuard<'_, Order> {
        self.order.lock().await
    }
}

/// Insertion-ordered queue with a movable read cursor.
///
/// `next` peeks the next not-yet-visited entry without removing it, so
/// a long-lived scan coexists with concurrent inserts and removals:
/// entries already queued at scan start are never missed, and inserts
/// never block on the scanner.
struct StateQueue {
    items: Vec<OrderId>,
    cursor: usize,
}

impl StateQueue {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
        }
    }

    fn push(&mut self, id: OrderId) {
        self.items.push(id);
    }

    fn remove(&mut self, id: OrderId) {
        if let Some(pos) = self.items.iter().position(|item| *item == id) {
            self.items.remove(pos);
            // Keep the cursor pointing at the same next entry.
            if pos < self.cursor {
                self.cursor -= 1;
            }
        }
    }

    fn next(&mut self) -> Option<OrderId> {
        let id = self.items.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(id)
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

struct Inner {
    orders: HashMap<OrderId, Arc<OrderHandle>>,
    queues: HashMap<OrderState, StateQueue>,
    remote: StateQueue,
}

/// The authoritative set of active orders.
pub struct OrderRegistry {
    local_provider_id: String,
    inner: Mutex<Inner>,
}

impl OrderRegistry {
    pub fn new(local_provider_id: impl Into<String>) -> Self {
        let queues = OrderState::ALL
            .into_iter()
            .map(|state| (state, StateQueue::new()))
            .collect();
        Self {
            local_provider_id: local_provider_id.into(),
            inner: Mutex::new(Inner {
                orders: HashMap::new(),
                queues,
                remote: StateQueue::new(),
            }),
        }
    }

    pub fn local_provider_id(&self) -> &str {
        &self.local_provider_id
    }

    /// Insert a new order into the map and the queue matching its
    /// current state. Fails if the id is already tracked.
    pub fn add(&self, order: Order) -> Result<Arc<OrderHandle>> {
        let mut inner = self.lock_inner();
        if inner.orders.contains_key(&order.id) {
            return Err(BrokerError::DuplicateOrder(order.id));
        }
        let id = order.id;
        let state = order.order_state;
        let remote = !order.is_local(&self.local_provider_id);
        let handle = Arc::new(OrderHandle::new(order));
        inner.orders.insert(id, handle.clone());
        inner
            .queues
            .get_mut(&state)
            .expect("queue exists for every state")
            .push(id);
        if remote {
            inner.remote.push(id);
        }
        Ok(handle)
    }

    /// Relocate an order between queues and update its state, in one
    /// critical section. The caller must hold the order's own lock;
    /// `order` is the guarded data.
    pub fn move_to_state(&self, order: &mut Order, new_state: OrderState) -> Result<()> {
        let mut inner = self.lock_inner();
        if !inner.orders.contains_key(&order.id) {
            return Err(BrokerError::OrderNotFound(order.id));
        }
        let old_state = order.order_state;
        inner
            .queues
            .get_mut(&old_state)
            .expect("queue exists for every state")
            .remove(order.id);
        order.order_state = new_state;
        inner
            .queues
            .get_mut(&new_state)
            .expect("queue exists for every state")
            .push(order.id);
        Ok(())
    }

    /// Drop an order from the active set. Only orders that reached the
    /// terminal state may leave the registry.
    pub fn remove(&self, order: &Order) -> Result<()> {
        if order.order_state != OrderState::Closed {
            return Err(BrokerError::Internal(format!(
                "refusing to remove order {} in non-terminal state {}",
                order.id, order.order_state
            )));
        }
        let mut inner = self.lock_inner();
        inner.orders.remove(&order.id);
        inner
            .queues
            .get_mut(&OrderState::Closed)
            .expect("queue exists for every state")
            .remove(order.id);
        inner.remote.remove(order.id);
        Ok(())
    }

    pub fn get(&self, id: OrderId) -> Option<Arc<OrderHandle>> {
        self.lock_inner().orders.get(&id).cloned()
    }

    /// Next not-yet-visited order in the given state queue, without
    /// removing it. Returns `None` when the scan reached the end.
    pub fn next_in_state(&self, state: OrderState) -> Option<Arc<OrderHandle>> {
        let mut inner = self.lock_inner();
        loop {
            let id = inner
                .queues
                .get_mut(&state)
                .expect("queue exists for every state")
                .next()?;
            if let Some(handle) = inner.orders.get(&id) {
                return Some(handle.clone());
            }
        }
    }

    pub fn reset_cursor(&self, state: OrderState) {
        self.lock_inner()
            .queues
            .get_mut(&state)
            .expect("queue exists for every state")
            .reset();
    }

    /// Next order in the remote-orders queue (spans states).
    pub fn next_remote(&self) -> Option<Arc<OrderHandle>> {
        let mut inner = self.lock_inner();
        loop {
            let id = inner.remote.next()?;
            if let Some(handle) = inner.orders.get(&id) {
                return Some(handle.clone());
            }
        }
    }

    pub fn reset_remote_cursor(&self) {
        self.lock_inner().remote.reset();
    }

    /// All active orders belonging to a user, any state. Consumed by
    /// the public query surface.
    pub fn orders_of_user(&self, user_id: &str) -> Vec<Arc<OrderHandle>> {
        self.lock_inner()
            .orders
            .values()
            .filter(|handle| handle.owner_id() == user_id)
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.lock_inner().orders.len()
    }

    pub fn queue_len(&self, state: OrderState) -> usize {
        self.lock_inner()
            .queues
            .get(&state)
            .expect("queue exists for every state")
            .len()
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("order registry lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skybroker_core::{ComputeSpec, OrderSpec, SystemUser};

    fn order(provider: &str) -> Order {
        Order::new(
            OrderSpec::Compute(ComputeSpec {
                vcpus: 2,
                memory_mb: 2048,
                disk_gb: 20,
                image_id: "img".to_string(),
                user_data: None,
            }),
            SystemUser::new("alice", "tok"),
            "provider-a",
            provider,
            "default",
        )
    }

    #[test]
    fn add_places_order_in_its_state_queue() {
        let registry = OrderRegistry::new("provider-a");
        registry.add(order("provider-a")).unwrap();
        assert_eq!(registry.queue_len(OrderState::Open), 1);
        assert_eq!(registry.queue_len(OrderState::Spawning), 0);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = OrderRegistry::new("provider-a");
        let order = order("provider-a");
        registry.add(order.clone()).unwrap();
        assert!(matches!(
            registry.add(order),
            Err(BrokerError::DuplicateOrder(_))
        ));
    }

    #[tokio::test]
    async fn move_keeps_exactly_one_queue_membership() {
        let registry = OrderRegistry::new("provider-a");
        let handle = registry.add(order("provider-a")).unwrap();

        let mut guard = handle.lock().await;
        registry
            .move_to_state(&mut guard, OrderState::Spawning)
            .unwrap();
        assert_eq!(guard.order_state, OrderState::Spawning);
        drop(guard);

        assert_eq!(registry.queue_len(OrderState::Open), 0);
        assert_eq!(registry.queue_len(OrderState::Spawning), 1);
    }

    #[test]
    fn remote_orders_join_the_remote_queue() {
        let registry = OrderRegistry::new("provider-a");
        registry.add(order("provider-b")).unwrap();
        registry.add(order("provider-a")).unwrap();

        let first = registry.next_remote().unwrap();
        assert_eq!(first.provider(), "provider-b");
        assert!(registry.next_remote().is_none());
    }

    #[tokio::test]
    async fn cursor_scan_visits_preexisting_orders_despite_removals() {
        let registry = OrderRegistry::new("provider-a");
        let first = registry.add(order("provider-a")).unwrap();
        let second = registry.add(order("provider-a")).unwrap();
        let third = registry.add(order("provider-a")).unwrap();

        // Visit the first entry, then remove it from under the cursor.
        assert_eq!(registry.next_in_state(OrderState::Open).unwrap().id(), first.id());
        {
            let mut guard = first.lock().await;
            registry
                .move_to_state(&mut guard, OrderState::Closed)
                .unwrap();
            registry.remove(&guard).unwrap();
        }

        // The scan still reaches the remaining entries, in order.
        assert_eq!(registry.next_in_state(OrderState::Open).unwrap().id(), second.id());
        assert_eq!(registry.next_in_state(OrderState::Open).unwrap().id(), third.id());
        assert!(registry.next_in_state(OrderState::Open).is_none());

        registry.reset_cursor(OrderState::Open);
        assert_eq!(registry.next_in_state(OrderState::Open).unwrap().id(), second.id());
    }

    #[tokio::test]
    async fn remove_requires_the_terminal_state() {
        let registry = OrderRegistry::new("provider-a");
        let handle = registry.add(order("provider-a")).unwrap();
        let guard = handle.lock().await;
        assert!(registry.remove(&guard).is_err());
    }

    #[test]
    fn orders_of_user_filters_by_owner() {
        let registry = OrderRegistry::new("provider-a");
        registry.add(order("provider-a")).unwrap();
        let mut other = order("provider-a");
        other.owner = SystemUser::new("carol", "tok2");
        registry.add(other).unwrap();

        assert_eq!(registry.orders_of_user("alice").len(), 1);
        assert_eq!(registry.orders_of_user("carol").len(), 1);
        assert_eq!(registry.orders_of_user("mallory").len(), 0);
    }
}
