//! Read models shared by the plugin capability and the federation
//! contract: images, quotas and security rules.

use serde::{Deserialize, Serialize};

/// Direction a security rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleDirection {
    Ingress,
    Egress,
}

/// Entry in an image listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: String,
    pub name: String,
}

/// Full image record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDetail {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
    pub min_disk_gb: u64,
    pub min_ram_mb: u64,
    pub status: String,
}

/// Per-user quota for one resource type, as reported by the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub total: u64,
    pub used: u64,
}

impl ResourceQuota {
    pub fn available(&self) -> u64 {
        self.total.saturating_sub(self.used)
    }
}

/// Security rule as stored by the cloud backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityRuleView {
    /// Cloud-assigned rule id, used for deletion.
    pub id: String,
    pub direction: RuleDirection,
    pub protocol: String,
    pub port_from: u16,
    pub port_to: u16,
    pub cidr: String,
}
