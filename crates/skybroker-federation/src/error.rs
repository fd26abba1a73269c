//! Structured protocol errors
//!
//! The broker taxonomy is preserved across the wire: a peer converts
//! its `BrokerError` into a `FederationError` payload, and the caller
//! maps it back. "order not found", "requester does not own order",
//! "wrong provider" and "peer unavailable" stay distinguishable end to
//! end.

use serde::{Deserialize, Serialize};
use skybroker_core::BrokerError;
use thiserror::Error;
use uuid::Uuid;

// Adjacently tagged: internal tagging cannot represent newtype
// variants wrapping strings or uuids.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum FederationError {
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Requester does not own order")]
    RequesterDoesNotOwnOrder,

    #[error("Wrong provider for order")]
    WrongProvider,

    /// Transport-level failure: the peer could not be reached at all.
    /// Never produced by a peer, only by the transport.
    #[error("Peer unavailable: {0}")]
    PeerUnavailable(String),

    #[error("Remote transient error: {0}")]
    Transient(String),

    #[error("Remote permanent error: {0}")]
    Permanent(String),

    #[error("Remote resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Remote instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Remote internal error: {0}")]
    Internal(String),
}

impl From<BrokerError> for FederationError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::OrderNotFound(id) => FederationError::OrderNotFound(id),
            BrokerError::UnauthorizedOwner => FederationError::RequesterDoesNotOwnOrder,
            BrokerError::Transient(msg) => FederationError::Transient(msg),
            BrokerError::Permanent(msg) => FederationError::Permanent(msg),
            BrokerError::ResourceExhausted(msg) => FederationError::ResourceExhausted(msg),
            BrokerError::InstanceNotFound(msg) => FederationError::InstanceNotFound(msg),
            BrokerError::PeerUnavailable(msg) => FederationError::PeerUnavailable(msg),
            BrokerError::ProtocolViolation(msg) => FederationError::Protocol(msg),
            BrokerError::DuplicateOrder(id) => {
                FederationError::Protocol(format!("order already exists: {id}"))
            }
            BrokerError::Storage(msg) | BrokerError::Internal(msg) => {
                FederationError::Internal(msg)
            }
        }
    }
}

impl From<FederationError> for BrokerError {
    fn from(err: FederationError) -> Self {
        match err {
            FederationError::OrderNotFound(id) => BrokerError::OrderNotFound(id),
            FederationError::RequesterDoesNotOwnOrder => BrokerError::UnauthorizedOwner,
            FederationError::WrongProvider => {
                BrokerError::ProtocolViolation("wrong provider for order".to_string())
            }
            FederationError::PeerUnavailable(msg) => BrokerError::PeerUnavailable(msg),
            FederationError::Transient(msg) => BrokerError::Transient(msg),
            FederationError::Permanent(msg) => BrokerError::Permanent(msg),
            FederationError::ResourceExhausted(msg) => BrokerError::ResourceExhausted(msg),
            FederationError::InstanceNotFound(msg) => BrokerError::InstanceNotFound(msg),
            FederationError::Protocol(msg) => BrokerError::ProtocolViolation(msg),
            FederationError::Internal(msg) => BrokerError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_survives_the_round_trip() {
        let id = Uuid::new_v4();
        let cases = vec![
            BrokerError::OrderNotFound(id),
            BrokerError::UnauthorizedOwner,
            BrokerError::PeerUnavailable("down".to_string()),
            BrokerError::ResourceExhausted("no flavor".to_string()),
        ];
        for err in cases {
            let wire: FederationError = err.into();
            let json = serde_json::to_string(&wire).unwrap();
            let back: FederationError = serde_json::from_str(&json).unwrap();
            assert_eq!(back, wire);
        }
    }

    #[test]
    fn wrong_provider_maps_to_protocol_violation() {
        let err: BrokerError = FederationError::WrongProvider.into();
        assert!(matches!(err, BrokerError::ProtocolViolation(_)));
    }
}
