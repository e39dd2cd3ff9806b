//! Single-consumer coalescing over sync requests.
//!
//! Any number of callers may set the `requested` flag; at most one drain loop
//! runs at a time, and a request that lands while a run is in progress is
//! picked up by the next loop iteration rather than spawning a second run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub(crate) struct CoalescingQueue {
    requested: AtomicBool,
    running: AtomicBool,
    cancelled: AtomicBool,
    loop_task: Mutex<Option<JoinHandle<()>>>,
}

impl CoalescingQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a sync request. Returns true when the caller must spawn a new
    /// drain loop (none is currently running).
    pub(crate) fn request(&self) -> bool {
        self.requested.store(true, Ordering::SeqCst);
        !self.cancelled.load(Ordering::SeqCst) && !self.running.swap(true, Ordering::SeqCst)
    }

    /// Atomically read-and-clear the request flag. False means the loop
    /// should exit.
    pub(crate) fn try_begin(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst) && self.requested.swap(false, Ordering::SeqCst)
    }

    /// Release the running claim. Returns true when a request slipped in
    /// after the final `try_begin` and this caller re-claimed the loop; the
    /// caller must keep draining.
    pub(crate) fn finish(&self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        if self.cancelled.load(Ordering::SeqCst) || !self.requested.load(Ordering::SeqCst) {
            return false;
        }
        !self.running.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn store_loop_task(&self, handle: JoinHandle<()>) {
        *self
            .loop_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    pub(crate) fn take_loop_task(&self) -> Option<JoinHandle<()>> {
        self.loop_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
