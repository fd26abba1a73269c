//! Core model for the skybroker federation broker
//!
//! This crate defines the entities shared by every other skybroker
//! crate: the [`Order`] and its lifecycle states, the authenticated
//! [`SystemUser`] carried through every call, the broker-wide error
//! taxonomy, and the stable-storage seam used for crash recovery.
//!
//! An order tracks one requested cloud resource (a VM, a volume, a
//! network, ...) from submission until it is fulfilled, fails, or is
//! torn down. Orders are fulfilled either by this provider (local) or
//! by a peer provider in the federation (remote); the distinction is
//! derived from the order's `provider` field, never stored.

pub mod error;
pub mod identity;
pub mod order;
pub mod state;
pub mod storage;
pub mod views;

pub use error::{BrokerError, Result};
pub use identity::SystemUser;
pub use order::{
    AttachmentSpec, ComputeAllocation, ComputeSpec, GenericSpec, ImageSpec, NetworkSpec, Order,
    OrderId, OrderSpec, PublicIpSpec, ResourceKind, SecurityRuleSpec, VolumeSpec,
};
pub use state::{InstanceState, OrderState};
pub use storage::StableStorage;
pub use views::{ImageDetail, ImageSummary, ResourceQuota, RuleDirection, SecurityRuleView};
