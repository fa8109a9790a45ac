//! Connectivity monitor
//!
//! Wraps the host platform's network status into a synchronous snapshot
//! plus a push subscription. The host feeds status changes in through
//! [`ConnectivityMonitor::report`]; consumers treat snapshots as
//! eventually consistent.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Default window during which a status flap is held back
pub const DEFAULT_FLAP_WINDOW: Duration = Duration::from_secs(2);

/// Physical transport of the active network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    None,
    Wifi,
    Cellular,
    Ethernet,
    Other,
}

/// One snapshot of the platform's network state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkStatus {
    /// Transport of the active network
    pub transport: Transport,
    /// The network advertises general internet capability
    pub internet: bool,
    /// The network passed reachability validation (not merely associated)
    pub validated: bool,
    /// The connection is metered (exposed for future policy, unenforced)
    pub metered: bool,
}

impl NetworkStatus {
    /// No active network
    pub const OFFLINE: Self = Self {
        transport: Transport::None,
        internet: false,
        validated: false,
        metered: false,
    };

    /// A validated, internet-capable network on the given transport
    #[must_use]
    pub const fn online(transport: Transport) -> Self {
        Self {
            transport,
            internet: true,
            validated: true,
            metered: matches!(transport, Transport::Cellular),
        }
    }

    /// Online is conjunctive: internet capability *and* passed validation.
    /// A connected-but-unvalidated network counts as offline so the
    /// executor never burns attempts against a captive portal.
    #[must_use]
    pub const fn is_online(&self) -> bool {
        self.internet && self.validated
    }
}

struct MonitorState {
    last_transition: Option<Instant>,
    pending: Option<NetworkStatus>,
}

/// Debounced holder of the platform network status
pub struct ConnectivityMonitor {
    tx: watch::Sender<NetworkStatus>,
    state: Mutex<MonitorState>,
    flap_window: Duration,
}

impl ConnectivityMonitor {
    /// Create a monitor seeded with an initial status
    #[must_use]
    pub fn new(initial: NetworkStatus) -> Self {
        Self::with_flap_window(initial, DEFAULT_FLAP_WINDOW)
    }

    /// Create a monitor with a custom debounce window
    #[must_use]
    pub fn with_flap_window(initial: NetworkStatus, flap_window: Duration) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            tx,
            state: Mutex::new(MonitorState {
                last_transition: None,
                pending: None,
            }),
            flap_window,
        }
    }

    /// Push a status change from the host platform.
    ///
    /// A transition reported inside the flap window of the previous
    /// committed transition is held pending and commits once the window
    /// has passed; reporting the current status cancels any held flap.
    pub fn report(&self, status: NetworkStatus) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Instant::now();
        self.commit_pending_if_due(&mut state, now);

        if status == *self.tx.borrow() {
            state.pending = None;
            return;
        }

        let within_window = state
            .last_transition
            .is_some_and(|at| now.duration_since(at) < self.flap_window);
        if within_window {
            state.pending = Some(status);
        } else {
            self.commit(&mut state, status, now);
        }
    }

    /// Synchronous online snapshot
    pub fn is_currently_online(&self) -> bool {
        self.current().is_online()
    }

    /// Synchronous status snapshot
    pub fn current(&self) -> NetworkStatus {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.commit_pending_if_due(&mut state, Instant::now());
        drop(state);
        *self.tx.borrow()
    }

    /// Whether the active connection is metered
    pub fn is_metered(&self) -> bool {
        self.current().metered
    }

    /// Subscribe to committed status transitions.
    ///
    /// The receiver observes the current value immediately and each
    /// committed transition afterwards; unchanged reports never notify.
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }

    fn commit_pending_if_due(&self, state: &mut MonitorState, now: Instant) {
        let due = state.pending.is_some()
            && state
                .last_transition
                .is_none_or(|at| now.duration_since(at) >= self.flap_window);
        if due {
            if let Some(status) = state.pending.take() {
                self.commit(state, status, now);
            }
        }
    }

    fn commit(&self, state: &mut MonitorState, status: NetworkStatus, now: Instant) {
        state.pending = None;
        state.last_transition = Some(now);
        let changed = self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            tracing::debug!(
                online = status.is_online(),
                transport = ?status.transport,
                metered = status.metered,
                "network status changed"
            );
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(NetworkStatus::OFFLINE)
    }
}
