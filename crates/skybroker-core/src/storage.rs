//! Stable storage seam
//!
//! The engine consumes durable storage only through this trait: orders
//! are written through on creation and on every state change, and read
//! back once at startup to rehydrate the registry. The engine treats
//! the store as an at-least-once durable log; duplicate writes on
//! retry must be tolerated by implementations.

use crate::error::Result;
use crate::order::{Order, OrderId};
use crate::state::OrderState;
use async_trait::async_trait;

#[async_trait]
pub trait StableStorage: Send + Sync {
    /// Persist a newly created order.
    async fn add(&self, order: &Order) -> Result<()>;

    /// Persist an updated order. `state_changed` is true when the call
    /// is part of a state transition, letting implementations keep a
    /// transition history if they want one.
    async fn update(&self, order: &Order, state_changed: bool) -> Result<()>;

    /// All persisted orders currently in `state`, oldest first. Called
    /// once per state at startup.
    async fn active_orders(&self, state: OrderState) -> Result<Vec<Order>>;

    /// Drop an order that reached the end of its life.
    async fn remove(&self, id: OrderId) -> Result<()>;
}
