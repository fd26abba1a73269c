//! Broker assembly and processor lifecycle
//!
//! Wires the registry, transitioner, connectors, controller and facade
//! together from one [`BrokerSetup`], rehydrates the registry from
//! stable storage, and owns the background processor tasks. There are
//! no globals; everything a component needs arrives through its
//! constructor.

use crate::connector::ConnectorFactory;
use crate::controller::OrderController;
use crate::facade::RemoteFacade;
use crate::processors::{
    ClosedProcessor, DispatchProcessor, MonitorProcessor, ProcessorContext, RemoteSyncProcessor,
};
use crate::registry::OrderRegistry;
use crate::transitioner::StateTransitioner;
use skybroker_cloud::PluginRegistry;
use skybroker_core::{OrderState, Result, StableStorage};
use skybroker_federation::FederationTransport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Sleep interval of each processor between queue passes.
#[derive(Debug, Clone)]
pub struct ProcessorIntervals {
    pub dispatch: Duration,
    pub pending: Duration,
    pub monitor: Duration,
    pub status_recheck: Duration,
    pub fulfilled: Duration,
    pub remote_sync: Duration,
    pub closed: Duration,
}

impl Default for ProcessorIntervals {
    fn default() -> Self {
        Self {
            dispatch: Duration::from_secs(1),
            pending: Duration::from_secs(5),
            monitor: Duration::from_secs(2),
            status_recheck: Duration::from_secs(10),
            fulfilled: Duration::from_secs(10),
            remote_sync: Duration::from_secs(5),
            closed: Duration::from_secs(2),
        }
    }
}

/// Everything a broker needs, provided explicitly by the caller.
pub struct BrokerSetup {
    pub local_provider_id: String,
    pub plugins: Arc<PluginRegistry>,
    pub transport: Arc<dyn FederationTransport>,
    pub storage: Arc<dyn StableStorage>,
    pub intervals: ProcessorIntervals,
}

pub struct Broker {
    registry: Arc<OrderRegistry>,
    controller: Arc<OrderController>,
    facade: Arc<RemoteFacade>,
    ctx: Arc<ProcessorContext>,
    intervals: ProcessorIntervals,
    stop: Arc<AtomicBool>,
}

impl Broker {
    /// Assemble a broker and rehydrate its registry from storage.
    ///
    /// Orders re-enter the queues in the exact state they were
    /// persisted in, ordered by creation time, so an in-flight state
    /// machine resumes where the previous process left it.
    pub async fn build(setup: BrokerSetup) -> Result<Self> {
        let registry = Arc::new(OrderRegistry::new(setup.local_provider_id.clone()));

        let mut recovered = 0usize;
        for state in OrderState::ALL {
            for order in setup.storage.active_orders(state).await? {
                registry.add(order)?;
                recovered += 1;
            }
        }
        if recovered > 0 {
            tracing::info!(count = recovered, "recovered orders from stable storage");
        }

        let transitioner = Arc::new(StateTransitioner::new(
            registry.clone(),
            setup.storage.clone(),
        ));
        let connectors = Arc::new(ConnectorFactory::new(
            setup.local_provider_id,
            setup.plugins.clone(),
            setup.transport,
            registry.clone(),
        ));
        let controller = Arc::new(OrderController::new(
            registry.clone(),
            transitioner.clone(),
            connectors.clone(),
            setup.storage.clone(),
        ));
        let facade = Arc::new(RemoteFacade::new(
            registry.clone(),
            transitioner.clone(),
            controller.clone(),
            setup.plugins,
        ));

        let stop = Arc::new(AtomicBool::new(false));
        let ctx = Arc::new(ProcessorContext::new(
            registry.clone(),
            transitioner,
            connectors,
            setup.storage,
            stop.clone(),
        ));

        Ok(Self {
            registry,
            controller,
            facade,
            ctx,
            intervals: setup.intervals,
            stop,
        })
    }

    pub fn registry(&self) -> &Arc<OrderRegistry> {
        &self.registry
    }

    pub fn controller(&self) -> &Arc<OrderController> {
        &self.controller
    }

    /// Handler for inbound federation requests; hand this to the
    /// transport serving peers.
    pub fn facade(&self) -> &Arc<RemoteFacade> {
        &self.facade
    }

    /// Shared processor dependencies, for callers driving queue
    /// passes themselves instead of through [`Broker::spawn_processors`].
    pub fn processor_context(&self) -> Arc<ProcessorContext> {
        self.ctx.clone()
    }

    /// Start all reconciliation loops. Call once.
    pub fn spawn_processors(&self) -> Vec<JoinHandle<()>> {
        let ctx = &self.ctx;
        let iv = &self.intervals;
        vec![
            tokio::spawn(DispatchProcessor::open(ctx.clone(), iv.dispatch).run()),
            tokio::spawn(DispatchProcessor::pending(ctx.clone(), iv.pending).run()),
            tokio::spawn(MonitorProcessor::spawning(ctx.clone(), iv.monitor).run()),
            tokio::spawn(MonitorProcessor::status_recheck(ctx.clone(), iv.status_recheck).run()),
            tokio::spawn(MonitorProcessor::fulfilled(ctx.clone(), iv.fulfilled).run()),
            tokio::spawn(RemoteSyncProcessor::new(ctx.clone(), iv.remote_sync).run()),
            tokio::spawn(ClosedProcessor::new(ctx.clone(), iv.closed).run()),
        ]
    }

    /// Signal the processors to stop after their current pass.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Relaxed);
        tracing::info!("broker shutdown requested");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonFileStorage;
    use skybroker_cloud::EmulatedCloud;
    use skybroker_core::{ComputeSpec, Order, OrderSpec, SystemUser};
    use skybroker_federation::LoopbackTransport;
    use tempfile::tempdir;

    fn setup_with(storage: Arc<dyn StableStorage>) -> BrokerSetup {
        let mut plugins = PluginRegistry::new();
        let cloud = Arc::new(EmulatedCloud::new());
        cloud.register("default", &mut plugins);
        BrokerSetup {
            local_provider_id: "provider-a".to_string(),
            plugins: Arc::new(plugins),
            transport: Arc::new(LoopbackTransport::new("provider-a")),
            storage,
            intervals: ProcessorIntervals::default(),
        }
    }

    fn order(state: OrderState) -> Order {
        let mut order = Order::new(
            OrderSpec::Compute(ComputeSpec {
                vcpus: 1,
                memory_mb: 1024,
                disk_gb: 10,
                image_id: "img".to_string(),
                user_data: None,
            }),
            SystemUser::new("alice", "tok"),
            "provider-a",
            "provider-a",
            "default",
        );
        order.order_state = state;
        order
    }

    #[tokio::test]
    async fn build_rehydrates_the_registry_per_state() {
        let dir = tempdir().unwrap();
        let storage: Arc<dyn StableStorage> =
            Arc::new(JsonFileStorage::open(dir.path()).await.unwrap());
        storage.add(&order(OrderState::Open)).await.unwrap();
        storage.add(&order(OrderState::Spawning)).await.unwrap();
        storage.add(&order(OrderState::Fulfilled)).await.unwrap();

        let broker = Broker::build(setup_with(storage)).await.unwrap();
        assert_eq!(broker.registry().active_count(), 3);
        assert_eq!(broker.registry().queue_len(OrderState::Open), 1);
        assert_eq!(broker.registry().queue_len(OrderState::Spawning), 1);
        assert_eq!(broker.registry().queue_len(OrderState::Fulfilled), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_spawned_processors() {
        let dir = tempdir().unwrap();
        let storage: Arc<dyn StableStorage> =
            Arc::new(JsonFileStorage::open(dir.path()).await.unwrap());
        let broker = Broker::build(setup_with(storage)).await.unwrap();

        let handles = broker.spawn_processors();
        broker.shutdown();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(30), handle)
                .await
                .expect("processor did not stop")
                .unwrap();
        }
    }
}
