//! Order orchestration engine
//!
//! The long-lived, concurrently-mutated heart of the broker:
//!
//! - [`registry::OrderRegistry`] — the authoritative in-memory set of
//!   active orders plus one cursor queue per state;
//! - [`transitioner::StateTransitioner`] — the sole mutator of order
//!   state and queue membership, write-through to stable storage;
//! - [`connector`] — per-call dispatch between the in-process plugin
//!   path and the federation path to the owning peer;
//! - [`processors`] — the background reconciliation loops that advance
//!   orders through the state machine;
//! - [`facade::RemoteFacade`] — the inbound side of the federation
//!   protocol;
//! - [`controller::OrderController`] — the entry point user-facing
//!   layers call into;
//! - [`broker::Broker`] — explicit wiring and processor lifecycle.

pub mod broker;
pub mod connector;
pub mod controller;
pub mod facade;
pub mod processors;
pub mod registry;
pub mod storage;
pub mod transitioner;

pub use broker::{Broker, BrokerSetup, ProcessorIntervals};
pub use connector::{CloudConnector, ConnectorFactory, InstanceSnapshot};
pub use controller::OrderController;
pub use facade::RemoteFacade;
pub use registry::{OrderHandle, OrderRegistry};
pub use storage::JsonFileStorage;
pub use transitioner::StateTransitioner;
