//! Order and instance lifecycle states

use serde::{Deserialize, Serialize};

/// Lifecycle state of an order.
///
/// `Closed` is the only terminal state; reaching it removes the order
/// from the registry's active set once its instance has been cleaned
/// up. An order is always a member of exactly one state queue, and
/// that membership always equals its `order_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Submitted, not yet dispatched to a backend.
    Open,
    /// Local dispatch failed transiently (retry pending), or the order
    /// was accepted by a remote peer and awaits state mirroring.
    Pending,
    /// Accepted by a backend, instance not yet ready.
    Spawning,
    /// Instance ready.
    Fulfilled,
    /// User requested deletion; instance cleanup pending. Terminal.
    Closed,
    /// Backend reported failure after the instance had been accepted.
    FailedAfterSuccessfulRequest,
    /// Initial dispatch permanently rejected.
    FailedOnRequest,
    /// The backend or the owning peer is unreachable; non-terminal,
    /// rechecked on the next pass.
    UnableToCheckStatus,
    /// Remote order whose deletion was requested; leaves this state
    /// only when the owning peer signals closure.
    AssignedForDeletion,
}

impl OrderState {
    /// All states, in queue-construction order.
    pub const ALL: [OrderState; 9] = [
        OrderState::Open,
        OrderState::Pending,
        OrderState::Spawning,
        OrderState::Fulfilled,
        OrderState::Closed,
        OrderState::FailedAfterSuccessfulRequest,
        OrderState::FailedOnRequest,
        OrderState::UnableToCheckStatus,
        OrderState::AssignedForDeletion,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Closed)
    }

    /// States that carry a recorded failure.
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            OrderState::FailedAfterSuccessfulRequest | OrderState::FailedOnRequest
        )
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderState::Open => write!(f, "open"),
            OrderState::Pending => write!(f, "pending"),
            OrderState::Spawning => write!(f, "spawning"),
            OrderState::Fulfilled => write!(f, "fulfilled"),
            OrderState::Closed => write!(f, "closed"),
            OrderState::FailedAfterSuccessfulRequest => write!(f, "failed_after_successful_request"),
            OrderState::FailedOnRequest => write!(f, "failed_on_request"),
            OrderState::UnableToCheckStatus => write!(f, "unable_to_check_status"),
            OrderState::AssignedForDeletion => write!(f, "assigned_for_deletion"),
        }
    }
}

/// Canonical, cloud-agnostic instance state.
///
/// Produced by a state normalizer from a cloud-native status string.
/// An order with no instance id yet synthesizes `Dispatched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Dispatched,
    Creating,
    Ready,
    Busy,
    Failed,
    Inconsistent,
    Unknown,
}

impl InstanceState {
    pub fn is_ready(&self) -> bool {
        matches!(self, InstanceState::Ready)
    }

    pub fn has_failed(&self) -> bool {
        matches!(self, InstanceState::Failed | InstanceState::Inconsistent)
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceState::Dispatched => write!(f, "dispatched"),
            InstanceState::Creating => write!(f, "creating"),
            InstanceState::Ready => write!(f, "ready"),
            InstanceState::Busy => write!(f, "busy"),
            InstanceState::Failed => write!(f, "failed"),
            InstanceState::Inconsistent => write!(f, "inconsistent"),
            InstanceState::Unknown => write!(f, "unknown"),
        }
    }
}
