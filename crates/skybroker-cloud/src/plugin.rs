//! Plugin capability traits

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skybroker_core::{
    ImageDetail, ImageSummary, InstanceState, Order, ResourceKind, ResourceQuota, Result,
    SecurityRuleSpec, SecurityRuleView, SystemUser,
};
use std::collections::HashMap;

/// What a backend reports about one instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudInstance {
    pub instance_id: String,

    /// Cloud-native status string, e.g. "ACTIVE" or "shutting-down".
    /// Only the per-cloud [`StateNormalizer`] interprets it.
    pub cloud_status: String,

    /// Backend-reported attributes (IP addresses, device names, ...).
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Per-resource-type operations against one cloud backend.
///
/// One implementation is registered per resource kind per cloud. All
/// operations run on the caller's behalf, using the identity carried
/// by the order.
#[async_trait]
pub trait ResourcePlugin: Send + Sync {
    /// Ask the backend to create the resource. Returns the
    /// backend-assigned instance id.
    async fn request_instance(&self, order: &Order, user: &SystemUser) -> Result<String>;

    /// Fetch the current instance for the order.
    async fn get_instance(&self, order: &Order, user: &SystemUser) -> Result<CloudInstance>;

    /// Delete the instance. Must be idempotent: deleting an
    /// already-deleted instance is not an error.
    async fn delete_instance(&self, order: &Order, user: &SystemUser) -> Result<()>;
}

/// Maps cloud-native status strings onto the canonical instance state,
/// one implementation per cloud backend.
pub trait StateNormalizer: Send + Sync {
    fn normalize(&self, kind: ResourceKind, cloud_status: &str) -> InstanceState;
}

/// Read-only image catalog of one cloud.
#[async_trait]
pub trait ImagePlugin: Send + Sync {
    async fn list_images(&self, user: &SystemUser) -> Result<Vec<ImageSummary>>;

    async fn get_image(&self, image_id: &str, user: &SystemUser) -> Result<ImageDetail>;
}

/// Per-user quota reporting of one cloud.
#[async_trait]
pub trait QuotaPlugin: Send + Sync {
    async fn user_quota(&self, kind: ResourceKind, user: &SystemUser) -> Result<ResourceQuota>;
}

/// Security rule CRUD against the group backing a network or public ip
/// order.
#[async_trait]
pub trait SecurityRulePlugin: Send + Sync {
    /// Returns the cloud-assigned rule id.
    async fn create_rule(
        &self,
        target: &Order,
        rule: &SecurityRuleSpec,
        user: &SystemUser,
    ) -> Result<String>;

    async fn delete_rule(&self, target: &Order, rule_id: &str, user: &SystemUser) -> Result<()>;

    async fn list_rules(&self, target: &Order, user: &SystemUser) -> Result<Vec<SecurityRuleView>>;
}
