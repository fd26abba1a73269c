//! Reconciliation processors
//!
//! Each processor is an independent loop bound to one state queue (the
//! remote sync processor scans the remote-orders queue instead). All
//! loops share one shape: scan the live queue through its cursor, lock
//! each order, reconcile it, classify any error; when the scan is
//! exhausted, rewind the cursor and sleep the configured interval.
//!
//! Failure discipline, shared by every processor: transient errors
//! never change order state and are retried on the next pass; placement
//! bugs self-heal with a defensive transition plus a warning;
//! unrecoverable backend answers are terminal and recorded once in the
//! order's fault message. No error ever terminates a processor loop.

mod closed;
mod dispatch;
mod monitor;
mod remote_sync;

pub use closed::ClosedProcessor;
pub use dispatch::DispatchProcessor;
pub use monitor::MonitorProcessor;
pub use remote_sync::RemoteSyncProcessor;

use crate::connector::ConnectorFactory;
use crate::registry::OrderRegistry;
use crate::transitioner::StateTransitioner;
use skybroker_core::StableStorage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared dependencies of every processor, plus the cooperative stop
/// flag. A processor observes the flag once per queue pass; a
/// reconcile already in flight finishes its current order first.
pub struct ProcessorContext {
    pub registry: Arc<OrderRegistry>,
    pub transitioner: Arc<StateTransitioner>,
    pub connectors: Arc<ConnectorFactory>,
    pub storage: Arc<dyn StableStorage>,
    stop: Arc<AtomicBool>,
}

impl ProcessorContext {
    pub fn new(
        registry: Arc<OrderRegistry>,
        transitioner: Arc<StateTransitioner>,
        connectors: Arc<ConnectorFactory>,
        storage: Arc<dyn StableStorage>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            registry,
            transitioner,
            connectors,
            storage,
            stop,
        }
    }

    pub fn local_provider_id(&self) -> &str {
        self.registry.local_provider_id()
    }

    pub fn must_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}
