//! Sync gate
//!
//! Sync may only run when the feature flag is on *and* the user is
//! authenticated (online or authenticated-offline). Both signals come
//! from collaborators outside this crate, so they are modelled as a
//! trait the host implements.

use std::sync::atomic::{AtomicBool, Ordering};

/// Combined feature-flag + authentication precondition for sync
pub trait SyncGate: Send + Sync {
    /// Whether the sync feature flag is enabled
    fn is_sync_enabled(&self) -> bool;

    /// Whether a user session is available
    fn is_authenticated(&self) -> bool;

    /// The gate is open when both preconditions hold
    fn is_open(&self) -> bool {
        self.is_sync_enabled() && self.is_authenticated()
    }
}

/// Atomically toggled gate for hosts without a dynamic flag service
#[derive(Debug)]
pub struct StaticGate {
    sync_enabled: AtomicBool,
    authenticated: AtomicBool,
}

impl StaticGate {
    #[must_use]
    pub const fn new(sync_enabled: bool, authenticated: bool) -> Self {
        Self {
            sync_enabled: AtomicBool::new(sync_enabled),
            authenticated: AtomicBool::new(authenticated),
        }
    }

    /// A fully open gate
    #[must_use]
    pub const fn open() -> Self {
        Self::new(true, true)
    }

    pub fn set_sync_enabled(&self, enabled: bool) {
        self.sync_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }
}

impl SyncGate for StaticGate {
    fn is_sync_enabled(&self) -> bool {
        self.sync_enabled.load(Ordering::SeqCst)
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }
}
