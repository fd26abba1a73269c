//! Emulated cloud backend
//!
//! A fully in-memory backend implementing every plugin capability.
//! The daemon wires it in when no real backend is configured, and the
//! engine tests use it to drive orders through their lifecycle without
//! network access. Status strings deliberately mimic a real cloud:
//! instances are created in `"creating"` and move only when a test or
//! an operator hook flips them.

use crate::plugin::{
    CloudInstance, ImagePlugin, QuotaPlugin, ResourcePlugin, SecurityRulePlugin, StateNormalizer,
};
use crate::registry::PluginRegistry;
use async_trait::async_trait;
use skybroker_core::{
    BrokerError, ImageDetail, ImageSummary, InstanceState, Order, ResourceKind, ResourceQuota,
    Result, SecurityRuleSpec, SecurityRuleView, SystemUser,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct EmulatedInstance {
    id: String,
    status: String,
}

#[derive(Default)]
struct EmulatedState {
    instances: HashMap<String, EmulatedInstance>,
    rules: HashMap<String, Vec<SecurityRuleView>>,
}

/// One emulated cloud, shared across resource kinds.
#[derive(Default)]
pub struct EmulatedCloud {
    state: Mutex<EmulatedState>,
    /// Per-user instance quota reported by the quota plugin.
    pub instance_quota: u64,
}

impl EmulatedCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EmulatedState::default()),
            instance_quota: 100,
        }
    }

    /// Flip an instance to `"ready"`.
    pub fn mark_ready(&self, instance_id: &str) {
        self.set_status(instance_id, "ready");
    }

    /// Flip an instance to `"failed"`.
    pub fn mark_failed(&self, instance_id: &str) {
        self.set_status(instance_id, "failed");
    }

    pub fn set_status(&self, instance_id: &str, status: &str) {
        let mut state = self.state.lock().expect("emulated cloud lock poisoned");
        if let Some(instance) = state.instances.get_mut(instance_id) {
            instance.status = status.to_string();
        }
    }

    pub fn instance_count(&self) -> usize {
        self.state
            .lock()
            .expect("emulated cloud lock poisoned")
            .instances
            .len()
    }

    /// Register this cloud under `name` for every capability it
    /// serves.
    pub fn register(self: &Arc<Self>, name: &str, plugins: &mut PluginRegistry) {
        for kind in [
            ResourceKind::Compute,
            ResourceKind::Volume,
            ResourceKind::Network,
            ResourceKind::Attachment,
            ResourceKind::PublicIp,
            ResourceKind::GenericResource,
        ] {
            plugins.register_resource(name, kind, self.clone());
        }
        plugins.register_normalizer(name, self.clone());
        plugins.register_images(name, self.clone());
        plugins.register_quotas(name, self.clone());
        plugins.register_security_rules(name, self.clone());
    }
}

#[async_trait]
impl ResourcePlugin for EmulatedCloud {
    async fn request_instance(&self, order: &Order, _user: &SystemUser) -> Result<String> {
        let id = format!("em-{}-{}", order.kind(), Uuid::new_v4());
        let mut state = self.state.lock().expect("emulated cloud lock poisoned");
        state.instances.insert(
            id.clone(),
            EmulatedInstance {
                id: id.clone(),
                status: "creating".to_string(),
            },
        );
        tracing::debug!(order_id = %order.id, instance_id = %id, "emulated instance created");
        Ok(id)
    }

    async fn get_instance(&self, order: &Order, _user: &SystemUser) -> Result<CloudInstance> {
        let instance_id = order
            .instance_id
            .as_deref()
            .ok_or_else(|| BrokerError::Internal("order has no instance id".to_string()))?;
        let state = self.state.lock().expect("emulated cloud lock poisoned");
        let instance = state
            .instances
            .get(instance_id)
            .ok_or_else(|| BrokerError::InstanceNotFound(instance_id.to_string()))?;
        Ok(CloudInstance {
            instance_id: instance.id.clone(),
            cloud_status: instance.status.clone(),
            attributes: HashMap::new(),
        })
    }

    async fn delete_instance(&self, order: &Order, _user: &SystemUser) -> Result<()> {
        if let Some(instance_id) = order.instance_id.as_deref() {
            let mut state = self.state.lock().expect("emulated cloud lock poisoned");
            // Idempotent: deleting an unknown instance is a no-op.
            state.instances.remove(instance_id);
        }
        Ok(())
    }
}

impl StateNormalizer for EmulatedCloud {
    fn normalize(&self, _kind: ResourceKind, cloud_status: &str) -> InstanceState {
        match cloud_status {
            "creating" | "spawning" => InstanceState::Creating,
            "ready" | "running" | "active" => InstanceState::Ready,
            "busy" | "resizing" => InstanceState::Busy,
            "failed" | "error" => InstanceState::Failed,
            "inconsistent" => InstanceState::Inconsistent,
            _ => InstanceState::Unknown,
        }
    }
}

#[async_trait]
impl ImagePlugin for EmulatedCloud {
    async fn list_images(&self, _user: &SystemUser) -> Result<Vec<ImageSummary>> {
        Ok(vec![
            ImageSummary {
                id: "em-image-1".to_string(),
                name: "emulated-linux".to_string(),
            },
            ImageSummary {
                id: "em-image-2".to_string(),
                name: "emulated-bsd".to_string(),
            },
        ])
    }

    async fn get_image(&self, image_id: &str, user: &SystemUser) -> Result<ImageDetail> {
        let summary = self
            .list_images(user)
            .await?
            .into_iter()
            .find(|image| image.id == image_id)
            .ok_or_else(|| BrokerError::InstanceNotFound(image_id.to_string()))?;
        Ok(ImageDetail {
            id: summary.id,
            name: summary.name,
            size_bytes: 2 * 1024 * 1024 * 1024,
            min_disk_gb: 10,
            min_ram_mb: 512,
            status: "active".to_string(),
        })
    }
}

#[async_trait]
impl QuotaPlugin for EmulatedCloud {
    async fn user_quota(&self, _kind: ResourceKind, _user: &SystemUser) -> Result<ResourceQuota> {
        Ok(ResourceQuota {
            total: self.instance_quota,
            used: self.instance_count() as u64,
        })
    }
}

#[async_trait]
impl SecurityRulePlugin for EmulatedCloud {
    async fn create_rule(
        &self,
        target: &Order,
        rule: &SecurityRuleSpec,
        _user: &SystemUser,
    ) -> Result<String> {
        let rule_id = format!("em-rule-{}", Uuid::new_v4());
        let view = SecurityRuleView {
            id: rule_id.clone(),
            direction: rule.direction,
            protocol: rule.protocol.clone(),
            port_from: rule.port_from,
            port_to: rule.port_to,
            cidr: rule.cidr.clone(),
        };
        let mut state = self.state.lock().expect("emulated cloud lock poisoned");
        state
            .rules
            .entry(target.id.to_string())
            .or_default()
            .push(view);
        Ok(rule_id)
    }

    async fn delete_rule(&self, target: &Order, rule_id: &str, _user: &SystemUser) -> Result<()> {
        let mut state = self.state.lock().expect("emulated cloud lock poisoned");
        if let Some(rules) = state.rules.get_mut(&target.id.to_string()) {
            rules.retain(|rule| rule.id != rule_id);
        }
        Ok(())
    }

    async fn list_rules(&self, target: &Order, _user: &SystemUser) -> Result<Vec<SecurityRuleView>> {
        let state = self.state.lock().expect("emulated cloud lock poisoned");
        Ok(state
            .rules
            .get(&target.id.to_string())
            .cloned()
            .unwrap_or_default())
    }
}
