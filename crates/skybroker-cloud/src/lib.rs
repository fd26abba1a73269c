//! Cloud plugin capability abstraction
//!
//! Concrete cloud backends (AWS, OpenStack, CloudStack, ...) live
//! outside the broker core. The engine consumes them only through the
//! narrow seams defined here:
//!
//! - [`ResourcePlugin`]: request/get/delete one resource type against
//!   one cloud, returning cloud-native status strings;
//! - [`StateNormalizer`]: maps a cloud-native status string to the
//!   canonical [`InstanceState`](skybroker_core::InstanceState);
//! - [`PluginRegistry`]: static `(cloud, resource kind)` lookup table
//!   resolved once at startup.
//!
//! The [`emulated`] module provides an in-memory backend used by the
//! daemon's default wiring and by tests.

pub mod emulated;
pub mod plugin;
pub mod registry;

pub use emulated::EmulatedCloud;
pub use plugin::{
    CloudInstance, ImagePlugin, QuotaPlugin, ResourcePlugin, SecurityRulePlugin, StateNormalizer,
};
pub use registry::PluginRegistry;
