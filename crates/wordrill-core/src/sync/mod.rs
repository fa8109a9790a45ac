//! Offline-first sync engine
//!
//! Domain code mutates local state while potentially disconnected; this
//! module durably captures every such mutation and delivers it to the
//! remote service once connectivity returns, without duplicating work or
//! blocking the UI. Layers, leaves first: connectivity monitor, durable
//! queue store (in [`crate::db`]), repository, executor, coordinator.

mod connectivity;
mod coordinator;
mod executor;
mod gate;
mod remote;
mod repository;
mod single_flight;

pub use connectivity::{ConnectivityMonitor, NetworkStatus, Transport, DEFAULT_FLAP_WINDOW};
pub use coordinator::{SyncConfig, SyncCoordinator};
pub use executor::{SyncExecutor, SyncOutcome};
pub use gate::{StaticGate, SyncGate};
pub use remote::{LoggingRemoteApi, RemoteError, RemoteFuture, RemoteSyncApi};
pub use repository::{SyncRepository, DEFAULT_DAYS_TO_KEEP, DEFAULT_MAX_ATTEMPTS};
pub use single_flight::{RunRequest, SingleFlight};
