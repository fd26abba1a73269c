//! The order: a tracked request for one cloud resource
//!
//! The resource-specific payload is a tagged union ([`OrderSpec`])
//! rather than a subclass hierarchy; the [`ResourceKind`] tag selects
//! the cloud plugin capability that services the order.

use crate::identity::SystemUser;
use crate::state::{InstanceState, OrderState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique order id, assigned at creation and stable for the
/// order's life.
pub type OrderId = Uuid;

/// Resource type serviced by one plugin capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Compute,
    Volume,
    Network,
    Attachment,
    PublicIp,
    SecurityRule,
    Image,
    GenericResource,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Compute => write!(f, "compute"),
            ResourceKind::Volume => write!(f, "volume"),
            ResourceKind::Network => write!(f, "network"),
            ResourceKind::Attachment => write!(f, "attachment"),
            ResourceKind::PublicIp => write!(f, "public_ip"),
            ResourceKind::SecurityRule => write!(f, "security_rule"),
            ResourceKind::Image => write!(f, "image"),
            ResourceKind::GenericResource => write!(f, "generic_resource"),
        }
    }
}

/// Immutable business payload set at order creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderSpec {
    Compute(ComputeSpec),
    Volume(VolumeSpec),
    Network(NetworkSpec),
    Attachment(AttachmentSpec),
    PublicIp(PublicIpSpec),
    SecurityRule(SecurityRuleSpec),
    Image(ImageSpec),
    GenericResource(GenericSpec),
}

impl OrderSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            OrderSpec::Compute(_) => ResourceKind::Compute,
            OrderSpec::Volume(_) => ResourceKind::Volume,
            OrderSpec::Network(_) => ResourceKind::Network,
            OrderSpec::Attachment(_) => ResourceKind::Attachment,
            OrderSpec::PublicIp(_) => ResourceKind::PublicIp,
            OrderSpec::SecurityRule(_) => ResourceKind::SecurityRule,
            OrderSpec::Image(_) => ResourceKind::Image,
            OrderSpec::GenericResource(_) => ResourceKind::GenericResource,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeSpec {
    pub vcpus: u32,
    /// Memory in MB.
    pub memory_mb: u64,
    /// Disk in GB.
    pub disk_gb: u64,
    pub image_id: String,
    /// Cloud-init style payload handed to the backend verbatim.
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub size_gb: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub cidr: String,
    pub allocation_mode: AllocationMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    Dynamic,
    Static,
}

/// Attachment orders carry broker-level order ids; the local connector
/// resolves them to cloud-native instance ids before calling the
/// plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentSpec {
    pub compute_order_id: OrderId,
    pub volume_order_id: OrderId,
    /// Device name requested on the VM, e.g. "/dev/sdb".
    pub device: Option<String>,
    /// Cloud-native ids, filled by the local connector on the copy it
    /// hands to the plugin. Never set on the tracked order itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_instance_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicIpSpec {
    pub compute_order_id: OrderId,
    /// See [`AttachmentSpec::compute_instance_id`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_instance_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityRuleSpec {
    /// Order (network or public ip) the rule applies to.
    pub target_order_id: OrderId,
    pub direction: crate::views::RuleDirection,
    pub protocol: String,
    pub port_from: u16,
    pub port_to: u16,
    pub cidr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub image_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericSpec {
    /// Opaque resource description forwarded to the plugin.
    pub resource: serde_json::Value,
}

/// What the backend actually allocated for a compute order, filled in
/// after acceptance. May differ from the requested spec when the cloud
/// rounds up to the nearest flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeAllocation {
    pub vcpus: u32,
    pub memory_mb: u64,
    pub disk_gb: u64,
}

/// The central entity: one tracked resource request with its own
/// lifecycle, independent of the underlying cloud instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,

    /// Resource-specific payload; immutable after creation.
    pub spec: OrderSpec,

    /// Provider that asked for the resource.
    pub requesting_provider: String,

    /// Provider that must fulfill the order.
    pub provider: String,

    /// Cloud, within `provider`, the order is dispatched to.
    pub cloud_name: String,

    /// Authenticated identity of the caller.
    pub owner: SystemUser,

    /// Backend-assigned instance id; `None` until the order has been
    /// successfully accepted by a backend.
    pub instance_id: Option<String>,

    pub order_state: OrderState,

    /// Last instance state observed by a monitoring pass.
    pub cached_instance_state: InstanceState,

    /// First failure reason. Write-once: later failures never
    /// overwrite it.
    pub fault_message: Option<String>,

    /// Allocation reported by the backend for compute orders.
    pub actual_allocation: Option<ComputeAllocation>,

    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        spec: OrderSpec,
        owner: SystemUser,
        requesting_provider: impl Into<String>,
        provider: impl Into<String>,
        cloud_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            spec,
            requesting_provider: requesting_provider.into(),
            provider: provider.into(),
            cloud_name: cloud_name.into(),
            owner,
            instance_id: None,
            order_state: OrderState::Open,
            cached_instance_state: InstanceState::Dispatched,
            fault_message: None,
            actual_allocation: None,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }

    /// Whether this provider fulfills the order directly.
    pub fn is_local(&self, local_provider_id: &str) -> bool {
        self.provider == local_provider_id
    }

    /// Records the first failure cause. Subsequent calls are no-ops so
    /// the original cause survives retries and later inspections.
    pub fn set_fault_message_once(&mut self, message: impl Into<String>) {
        if self.fault_message.is_none() {
            self.fault_message = Some(message.into());
        }
    }

    /// Overwrites locally cached fields with the authoritative snapshot
    /// held by the owning peer. The caller transitions `order_state`
    /// separately, through the state transitioner.
    pub fn update_from_remote(&mut self, remote: &Order) {
        self.instance_id = remote.instance_id.clone();
        self.cached_instance_state = remote.cached_instance_state;
        self.actual_allocation = remote.actual_allocation;
        if let Some(fault) = &remote.fault_message {
            self.set_fault_message_once(fault.clone());
        }
    }

    /// Instance state to report for this order. Orders that were never
    /// accepted by a backend have no instance to ask about, so the
    /// state is synthesized from the order state.
    pub fn instance_state_view(&self) -> InstanceState {
        if self.instance_id.is_some() {
            return self.cached_instance_state;
        }
        match self.order_state {
            OrderState::Open | OrderState::Pending => InstanceState::Dispatched,
            OrderState::FailedOnRequest | OrderState::FailedAfterSuccessfulRequest => {
                InstanceState::Failed
            }
            _ => InstanceState::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute_order() -> Order {
        Order::new(
            OrderSpec::Compute(ComputeSpec {
                vcpus: 2,
                memory_mb: 2048,
                disk_gb: 20,
                image_id: "ubuntu-24.04".to_string(),
                user_data: None,
            }),
            SystemUser::new("alice", "token-1"),
            "provider-a",
            "provider-a",
            "default",
        )
    }

    #[test]
    fn locality_follows_the_provider_field() {
        let order = compute_order();
        assert!(order.is_local("provider-a"));
        assert!(!order.is_local("provider-b"));
    }

    #[test]
    fn fault_message_is_write_once() {
        let mut order = compute_order();
        order.set_fault_message_once("quota exceeded");
        order.set_fault_message_once("some later failure");
        assert_eq!(order.fault_message.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn instance_state_is_synthesized_before_acceptance() {
        let mut order = compute_order();
        assert_eq!(order.instance_state_view(), InstanceState::Dispatched);

        order.order_state = OrderState::FailedOnRequest;
        assert_eq!(order.instance_state_view(), InstanceState::Failed);

        order.instance_id = Some("i-1".to_string());
        order.cached_instance_state = InstanceState::Ready;
        assert_eq!(order.instance_state_view(), InstanceState::Ready);
    }

    #[test]
    fn remote_update_keeps_the_original_fault() {
        let mut local = compute_order();
        local.set_fault_message_once("first cause");

        let mut remote = local.clone();
        remote.instance_id = Some("i-9".to_string());
        remote.cached_instance_state = InstanceState::Ready;
        remote.fault_message = Some("remote cause".to_string());

        local.update_from_remote(&remote);
        assert_eq!(local.instance_id.as_deref(), Some("i-9"));
        assert_eq!(local.cached_instance_state, InstanceState::Ready);
        assert_eq!(local.fault_message.as_deref(), Some("first cause"));
    }

    #[test]
    fn order_roundtrips_through_json() {
        let order = compute_order();
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, order.id);
        assert_eq!(back.kind(), ResourceKind::Compute);
        assert_eq!(back.order_state, OrderState::Open);
    }
}
