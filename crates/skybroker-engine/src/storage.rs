//! JSON-file stable storage
//!
//! File-backed implementation of [`StableStorage`] keeping every
//! active order in a single `orders.json`, rewritten on each change
//! with a backup of the previous generation. Good enough for a single
//! broker process; a SQL-backed implementation plugs into the same
//! trait.

use async_trait::async_trait;
use skybroker_core::{BrokerError, Order, OrderId, OrderState, Result, StableStorage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const STORE_FILE: &str = "orders.json";
const STORE_BACKUP: &str = "orders.json.backup";

pub struct JsonFileStorage {
    dir: PathBuf,
    orders: Mutex<HashMap<OrderId, Order>>,
}

impl JsonFileStorage {
    /// Open (or create) the store under `dir`, loading any previously
    /// persisted orders.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!(dir = %dir.display(), "created storage directory");
        }

        let path = dir.join(STORE_FILE);
        let orders = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            let list: Vec<Order> = serde_json::from_str(&content)?;
            tracing::debug!(count = list.len(), "loaded persisted orders");
            list.into_iter().map(|order| (order.id, order)).collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            dir,
            orders: Mutex::new(orders),
        })
    }

    fn store_path(&self) -> PathBuf {
        self.dir.join(STORE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.dir.join(STORE_BACKUP)
    }

    async fn save(&self, orders: &HashMap<OrderId, Order>) -> Result<()> {
        let path = self.store_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
        }

        let mut list: Vec<&Order> = orders.values().collect();
        list.sort_by_key(|order| order.created_at);
        let content = serde_json::to_string_pretty(&list)?;
        fs::write(&path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl StableStorage for JsonFileStorage {
    async fn add(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.lock().await;
        if orders.contains_key(&order.id) {
            return Err(BrokerError::DuplicateOrder(order.id));
        }
        orders.insert(order.id, order.clone());
        self.save(&orders).await
    }

    async fn update(&self, order: &Order, _state_changed: bool) -> Result<()> {
        let mut orders = self.orders.lock().await;
        // At-least-once log: an update for an unknown order re-adds it.
        orders.insert(order.id, order.clone());
        self.save(&orders).await
    }

    async fn active_orders(&self, state: OrderState) -> Result<Vec<Order>> {
        let orders = self.orders.lock().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|order| order.order_state == state)
            .cloned()
            .collect();
        matching.sort_by_key(|order| order.created_at);
        Ok(matching)
    }

    async fn remove(&self, id: OrderId) -> Result<()> {
        let mut orders = self.orders.lock().await;
        if orders.remove(&id).is_some() {
            self.save(&orders).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skybroker_core::{ComputeSpec, OrderSpec, SystemUser};
    use tempfile::tempdir;

    fn order() -> Order {
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
            "provider-a",
            "default",
        )
    }

    #[tokio::test]
    async fn orders_survive_a_reopen() {
        let dir = tempdir().unwrap();
        let order = order();

        {
            let storage = JsonFileStorage::open(dir.path()).await.unwrap();
            storage.add(&order).await.unwrap();
        }

        let storage = JsonFileStorage::open(dir.path()).await.unwrap();
        let open = storage.active_orders(OrderState::Open).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, order.id);
    }

    #[tokio::test]
    async fn update_moves_orders_between_state_buckets() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::open(dir.path()).await.unwrap();

        let mut order = order();
        storage.add(&order).await.unwrap();

        order.order_state = OrderState::Spawning;
        order.instance_id = Some("i-1".to_string());
        storage.update(&order, true).await.unwrap();

        assert!(storage.active_orders(OrderState::Open).await.unwrap().is_empty());
        let spawning = storage.active_orders(OrderState::Spawning).await.unwrap();
        assert_eq!(spawning[0].instance_id.as_deref(), Some("i-1"));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::open(dir.path()).await.unwrap();

        let order = order();
        storage.add(&order).await.unwrap();
        storage.remove(order.id).await.unwrap();
        storage.remove(order.id).await.unwrap();
        assert!(storage.active_orders(OrderState::Open).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn a_backup_of_the_previous_generation_is_kept() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::open(dir.path()).await.unwrap();

        storage.add(&order()).await.unwrap();
        storage.add(&order()).await.unwrap();
        assert!(dir.path().join(STORE_BACKUP).exists());
    }
}
