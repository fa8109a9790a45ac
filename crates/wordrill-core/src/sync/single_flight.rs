//! Single-flight guard
//!
//! Models the platform scheduler's "unique named work" policy in
//! process: an atomic in-flight flag plus a depth-1 coalescing slot for
//! immediate run requests. Opportunistic triggers keep an existing
//! pending request; an explicit force replaces it. Either way at most
//! one request waits and at most one run executes at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

/// One coalesced request for an immediate sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRequest {
    /// True for explicit force-sync requests
    pub forced: bool,
}

impl RunRequest {
    #[must_use]
    pub const fn immediate() -> Self {
        Self { forced: false }
    }

    #[must_use]
    pub const fn forced() -> Self {
        Self { forced: true }
    }
}

/// Atomic in-flight flag + depth-1 pending slot
#[derive(Debug, Default)]
pub struct SingleFlight {
    in_flight: AtomicBool,
    pending: Mutex<Option<RunRequest>>,
    notify: Notify,
}

impl SingleFlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a run, keeping any request already waiting.
    ///
    /// Returns false when the slot was occupied and the request was
    /// dropped (the waiting run covers it).
    pub fn request(&self, request: RunRequest) -> bool {
        let mut slot = self.lock_pending();
        if slot.is_some() {
            return false;
        }
        *slot = Some(request);
        drop(slot);
        self.notify.notify_one();
        true
    }

    /// Request a run, replacing any request already waiting
    pub fn request_replacing(&self, request: RunRequest) {
        *self.lock_pending() = Some(request);
        self.notify.notify_one();
    }

    /// Consume the waiting request, if any
    pub fn take(&self) -> Option<RunRequest> {
        self.lock_pending().take()
    }

    /// Whether a request is waiting
    pub fn has_pending(&self) -> bool {
        self.lock_pending().is_some()
    }

    /// Claim the in-flight flag; returns false when a run is active
    pub fn try_begin(&self) -> bool {
        !self.in_flight.swap(true, Ordering::SeqCst)
    }

    /// Release the in-flight flag
    pub fn finish(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    /// Whether a run is currently executing
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until a request is signalled
    pub async fn signalled(&self) {
        self.notify.notified().await;
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<RunRequest>> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn second_request_is_dropped_not_queued() {
        let flight = SingleFlight::new();

        assert!(flight.request(RunRequest::immediate()));
        assert!(!flight.request(RunRequest::immediate()));

        assert_eq!(flight.take(), Some(RunRequest::immediate()));
        assert_eq!(flight.take(), None);
    }

    #[test]
    fn force_replaces_the_pending_request() {
        let flight = SingleFlight::new();

        flight.request(RunRequest::immediate());
        flight.request_replacing(RunRequest::forced());

        assert_eq!(flight.take(), Some(RunRequest::forced()));
        assert_eq!(flight.take(), None);
    }

    #[test]
    fn only_one_run_can_begin() {
        let flight = SingleFlight::new();

        assert!(flight.try_begin());
        assert!(!flight.try_begin());
        assert!(flight.is_in_flight());

        flight.finish();
        assert!(flight.try_begin());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn request_wakes_a_waiter() {
        use std::sync::Arc;

        let flight = Arc::new(SingleFlight::new());
        let waiter = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move {
                flight.signalled().await;
                flight.take()
            })
        };

        // Give the waiter a chance to park before signalling
        tokio::task::yield_now().await;
        flight.request(RunRequest::forced());

        let taken = waiter.await.unwrap();
        assert_eq!(taken, Some(RunRequest::forced()));
    }
}
