//! Request/response message types

use serde::{Deserialize, Serialize};
use skybroker_core::{
    ImageDetail, ImageSummary, Order, OrderId, ResourceKind, ResourceQuota, SecurityRuleSpec,
    SecurityRuleView, SystemUser,
};

/// Out-of-band event a provider sends to the requester of one of its
/// orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEvent {
    /// The instance failed after it had been successfully requested.
    InstanceFailed,
    /// The order was closed on the owning side; the requester's mirror
    /// must close too.
    Closed,
}

/// Inbound request from a peer provider. Every call carries the
/// caller's federation identity; the order/resource id it targets is
/// part of the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum FederationRequest {
    /// Register a new order on the receiving provider, state Open.
    CreateOrder { order: Order },

    DeleteOrder { order_id: OrderId, user: SystemUser },

    /// Full authoritative snapshot, used by remote-order
    /// synchronization.
    GetOrder { order_id: OrderId, user: SystemUser },

    /// Inform the requesting provider of an event on an order this
    /// caller owns.
    NotifyEvent { order_id: OrderId, event: OrderEvent },

    GetAllImages { cloud_name: String, user: SystemUser },

    GetImage {
        cloud_name: String,
        image_id: String,
        user: SystemUser,
    },

    GetUserQuota {
        cloud_name: String,
        kind: ResourceKind,
        user: SystemUser,
    },

    CreateSecurityRule {
        target_order_id: OrderId,
        rule: SecurityRuleSpec,
        user: SystemUser,
    },

    DeleteSecurityRule {
        target_order_id: OrderId,
        rule_id: String,
        user: SystemUser,
    },

    GetAllSecurityRules { target_order_id: OrderId, user: SystemUser },
}

impl FederationRequest {
    /// Short method name for logging.
    pub fn method(&self) -> &'static str {
        match self {
            FederationRequest::CreateOrder { .. } => "create_order",
            FederationRequest::DeleteOrder { .. } => "delete_order",
            FederationRequest::GetOrder { .. } => "get_order",
            FederationRequest::NotifyEvent { .. } => "notify_event",
            FederationRequest::GetAllImages { .. } => "get_all_images",
            FederationRequest::GetImage { .. } => "get_image",
            FederationRequest::GetUserQuota { .. } => "get_user_quota",
            FederationRequest::CreateSecurityRule { .. } => "create_security_rule",
            FederationRequest::DeleteSecurityRule { .. } => "delete_security_rule",
            FederationRequest::GetAllSecurityRules { .. } => "get_all_security_rules",
        }
    }
}

/// Success payload of a federation call.
// Adjacently tagged, like `FederationError`: `Images` and
// `SecurityRuleId` wrap a sequence and a string, which internal
// tagging cannot represent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", content = "payload", rename_all = "snake_case")]
pub enum FederationResponse {
    Accepted,
    Order(Order),
    Images(Vec<ImageSummary>),
    Image(ImageDetail),
    Quota(ResourceQuota),
    SecurityRuleId(String),
    SecurityRules(Vec<SecurityRuleView>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_response_payload_shape_roundtrips() {
        let cases = vec![
            FederationResponse::Accepted,
            FederationResponse::Images(vec![ImageSummary {
                id: "img-1".to_string(),
                name: "linux".to_string(),
            }]),
            FederationResponse::SecurityRuleId("rule-1".to_string()),
            FederationResponse::Quota(ResourceQuota {
                total: 10,
                used: 3,
            }),
        ];
        for response in cases {
            let json = serde_json::to_string(&response).expect("response serializes");
            let back: FederationResponse = serde_json::from_str(&json).unwrap();
            assert_eq!(
                std::mem::discriminant(&back),
                std::mem::discriminant(&response)
            );
        }
    }

    #[test]
    fn requests_roundtrip_with_their_method_tag() {
        let request = FederationRequest::GetAllImages {
            cloud_name: "default".to_string(),
            user: SystemUser::new("alice", "tok"),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"method\":\"get_all_images\""));
        let back: FederationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.method(), "get_all_images");
    }
}
