//! Inter-provider protocol contract
//!
//! Providers in a federation talk to each other through a
//! request/response channel. This crate defines the logical contract
//! only: the message types, the structured errors a peer can return,
//! and the [`FederationTransport`] seam a wire implementation plugs
//! into. Any reliable request/response channel satisfies the contract;
//! no byte layout is prescribed here.
//!
//! Calls are single-hop: a provider only ever talks to the peer that
//! owns the target resource, never through an intermediary.

pub mod error;
pub mod message;
pub mod transport;

pub use error::FederationError;
pub use message::{FederationRequest, FederationResponse, OrderEvent};
pub use transport::{FederationHandler, FederationTransport, LoopbackTransport};
