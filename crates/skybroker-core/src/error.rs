//! Broker error taxonomy
//!
//! The taxonomy is part of the observable contract: processors decide
//! state transitions from the variant, and the federation layer maps
//! the variant across the wire so a remote caller can map it back.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the broker core, the cloud connectors and the
/// plugin capability.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Network blip, rate limit, backend momentarily unavailable.
    /// Never changes order state; retried on the next queue pass.
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// Explicit cloud failure / invalid / deregistered status. Terminal
    /// for the order.
    #[error("Permanent backend error: {0}")]
    Permanent(String),

    /// No matching offering/flavor. Retried from the Pending state.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The party holding the instance cannot be reached: the owning
    /// peer provider, or the endpoint of a local cloud backend.
    #[error("Peer unavailable: {0}")]
    PeerUnavailable(String),

    /// Wrong provider, order/type mismatch, misrouted request. Fatal to
    /// the single call, never mutates registry state.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The backend reports the instance no longer exists.
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Requester does not own order")]
    UnauthorizedOwner,

    #[error("Order already exists: {0}")]
    DuplicateOrder(Uuid),

    #[error("Stable storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    /// Whether the error leaves order state untouched and is retried on
    /// the next pass. Unclassifiable conditions are treated as
    /// transient by the processors, so this only needs to name the
    /// variants that are transient by definition.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrokerError::Transient(_) | BrokerError::Storage(_) | BrokerError::Internal(_)
        )
    }
}

impl From<std::io::Error> for BrokerError {
    fn from(err: std::io::Error) -> Self {
        BrokerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
