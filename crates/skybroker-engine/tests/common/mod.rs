//! Shared harness for the engine integration tests.
//!
//! Builds fully wired brokers over the emulated cloud, file storage in
//! a temp dir and the loopback transport. Tests drive processor passes
//! by hand, so every assertion runs against a quiesced broker instead
//! of racing background loops.

#![allow(dead_code)]

use async_trait::async_trait;
use skybroker_cloud::{CloudInstance, EmulatedCloud, PluginRegistry, ResourcePlugin};
use skybroker_core::{
    BrokerError, ComputeSpec, Order, OrderSpec, ResourceKind, Result, SystemUser,
};
use skybroker_engine::{Broker, BrokerSetup, JsonFileStorage, ProcessorIntervals};
use skybroker_federation::LoopbackTransport;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

/// Resource plugin answering `request_instance` and `get_instance`
/// from scripted queues, for driving the dispatch retry policy and
/// backend outages. Registered under the cloud name `"scripted"` for
/// compute orders.
pub struct ScriptedPlugin {
    responses: Mutex<VecDeque<Result<String>>>,
    poll_responses: Mutex<VecDeque<Result<CloudInstance>>>,
}

impl ScriptedPlugin {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            poll_responses: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_response(&self, response: Result<String>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Scripts the next `get_instance` answer. With the queue empty the
    /// plugin reports the order's own instance as "ready".
    pub fn push_poll(&self, response: Result<CloudInstance>) {
        self.poll_responses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl ResourcePlugin for ScriptedPlugin {
    async fn request_instance(&self, _order: &Order, _user: &SystemUser) -> Result<String> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("scripted-{}", Uuid::new_v4())))
    }

    async fn get_instance(&self, order: &Order, _user: &SystemUser) -> Result<CloudInstance> {
        if let Some(scripted) = self.poll_responses.lock().unwrap().pop_front() {
            return scripted;
        }
        let instance_id = order
            .instance_id
            .clone()
            .ok_or_else(|| BrokerError::InstanceNotFound("no instance".to_string()))?;
        Ok(CloudInstance {
            instance_id,
            cloud_status: "ready".to_string(),
            attributes: HashMap::new(),
        })
    }

    async fn delete_instance(&self, _order: &Order, _user: &SystemUser) -> Result<()> {
        Ok(())
    }
}

pub struct TestBroker {
    pub broker: Broker,
    pub cloud: Arc<EmulatedCloud>,
    pub scripted: Arc<ScriptedPlugin>,
    pub transport: Arc<LoopbackTransport>,
    _dir: TempDir,
}

pub async fn test_broker(provider: &str) -> TestBroker {
    let dir = tempfile::tempdir().expect("temp dir");
    let cloud = Arc::new(EmulatedCloud::new());
    let scripted = Arc::new(ScriptedPlugin::new());

    let mut plugins = PluginRegistry::new();
    cloud.register("default", &mut plugins);
    plugins.register_resource("scripted", ResourceKind::Compute, scripted.clone());
    plugins.register_normalizer("scripted", cloud.clone());

    let transport = Arc::new(LoopbackTransport::new(provider));
    let storage = Arc::new(
        JsonFileStorage::open(dir.path())
            .await
            .expect("storage open"),
    );

    let broker = Broker::build(BrokerSetup {
        local_provider_id: provider.to_string(),
        plugins: Arc::new(plugins),
        transport: transport.clone(),
        storage,
        intervals: ProcessorIntervals::default(),
    })
    .await
    .expect("broker build");

    TestBroker {
        broker,
        cloud,
        scripted,
        transport,
        _dir: dir,
    }
}

/// Wire two brokers as federation peers of each other.
pub fn federate(a: &TestBroker, b: &TestBroker) {
    let a_id = a.broker.registry().local_provider_id().to_string();
    let b_id = b.broker.registry().local_provider_id().to_string();
    a.transport.attach_peer(b_id, b.broker.facade().clone());
    b.transport.attach_peer(a_id, a.broker.facade().clone());
}

pub fn alice() -> SystemUser {
    SystemUser::new("alice", "token-alice")
}

pub fn compute_order(
    requesting_provider: &str,
    provider: &str,
    cloud_name: &str,
) -> Order {
    Order::new(
        OrderSpec::Compute(ComputeSpec {
            vcpus: 2,
            memory_mb: 2048,
            disk_gb: 20,
            image_id: "ubuntu-24.04".to_string(),
            user_data: None,
        }),
        alice(),
        requesting_provider,
        provider,
        cloud_name,
    )
}
