//! Static plugin lookup
//!
//! All plugin resolution happens against this table, built once at
//! startup. Lookups are by `(cloud name, resource kind)` for resource
//! plugins and by cloud name for the per-cloud normalizer and the
//! read-only catalog plugins.

use crate::plugin::{ImagePlugin, QuotaPlugin, ResourcePlugin, SecurityRulePlugin, StateNormalizer};
use skybroker_core::{BrokerError, ResourceKind, Result};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct PluginRegistry {
    resources: HashMap<(String, ResourceKind), Arc<dyn ResourcePlugin>>,
    normalizers: HashMap<String, Arc<dyn StateNormalizer>>,
    images: HashMap<String, Arc<dyn ImagePlugin>>,
    quotas: HashMap<String, Arc<dyn QuotaPlugin>>,
    security_rules: HashMap<String, Arc<dyn SecurityRulePlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_resource(
        &mut self,
        cloud: impl Into<String>,
        kind: ResourceKind,
        plugin: Arc<dyn ResourcePlugin>,
    ) {
        self.resources.insert((cloud.into(), kind), plugin);
    }

    pub fn register_normalizer(
        &mut self,
        cloud: impl Into<String>,
        normalizer: Arc<dyn StateNormalizer>,
    ) {
        self.normalizers.insert(cloud.into(), normalizer);
    }

    pub fn register_images(&mut self, cloud: impl Into<String>, plugin: Arc<dyn ImagePlugin>) {
        self.images.insert(cloud.into(), plugin);
    }

    pub fn register_quotas(&mut self, cloud: impl Into<String>, plugin: Arc<dyn QuotaPlugin>) {
        self.quotas.insert(cloud.into(), plugin);
    }

    pub fn register_security_rules(
        &mut self,
        cloud: impl Into<String>,
        plugin: Arc<dyn SecurityRulePlugin>,
    ) {
        self.security_rules.insert(cloud.into(), plugin);
    }

    pub fn resource(&self, cloud: &str, kind: ResourceKind) -> Result<Arc<dyn ResourcePlugin>> {
        self.resources
            .get(&(cloud.to_string(), kind))
            .cloned()
            .ok_or_else(|| {
                BrokerError::Internal(format!("no {kind} plugin registered for cloud {cloud}"))
            })
    }

    pub fn normalizer(&self, cloud: &str) -> Result<Arc<dyn StateNormalizer>> {
        self.normalizers.get(cloud).cloned().ok_or_else(|| {
            BrokerError::Internal(format!("no state normalizer registered for cloud {cloud}"))
        })
    }

    pub fn images(&self, cloud: &str) -> Result<Arc<dyn ImagePlugin>> {
        self.images.get(cloud).cloned().ok_or_else(|| {
            BrokerError::Internal(format!("no image plugin registered for cloud {cloud}"))
        })
    }

    pub fn quotas(&self, cloud: &str) -> Result<Arc<dyn QuotaPlugin>> {
        self.quotas.get(cloud).cloned().ok_or_else(|| {
            BrokerError::Internal(format!("no quota plugin registered for cloud {cloud}"))
        })
    }

    pub fn security_rules(&self, cloud: &str) -> Result<Arc<dyn SecurityRulePlugin>> {
        self.security_rules.get(cloud).cloned().ok_or_else(|| {
            BrokerError::Internal(format!(
                "no security rule plugin registered for cloud {cloud}"
            ))
        })
    }

    pub fn clouds(&self) -> Vec<&str> {
        self.normalizers.keys().map(String::as_str).collect()
    }
}
