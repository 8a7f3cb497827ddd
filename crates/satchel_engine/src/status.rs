//! Observable sync status.

use tokio::sync::watch;

/// The externally visible state of the sync coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// Nothing in flight.
    #[default]
    Idle,
    /// A sync cycle is running.
    Syncing,
    /// The last cycle succeeded; decays back to idle shortly after.
    Success,
    /// The last cycle failed.
    Error,
}

impl SyncStatus {
    /// Returns true if a cycle is currently running.
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncStatus::Syncing)
    }
}

/// Shared handle for publishing and observing sync status.
///
/// Carries two watch channels: the coordinator's state machine and the
/// number of outbox entries still waiting to be pushed. UIs typically
/// render both (a spinner and a badge).
#[derive(Debug, Clone)]
pub struct StatusHandle {
    tx: watch::Sender<SyncStatus>,
    pending_tx: watch::Sender<usize>,
}

impl StatusHandle {
    /// Creates a handle starting at idle with nothing pending.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SyncStatus::Idle);
        let (pending_tx, _) = watch::channel(0);
        Self { tx, pending_tx }
    }

    /// Publishes a new status.
    pub fn set(&self, status: SyncStatus) {
        // send_replace keeps working with no subscribers.
        self.tx.send_replace(status);
    }

    /// Returns the current status.
    pub fn current(&self) -> SyncStatus {
        *self.tx.borrow()
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }

    /// Publishes the pending-mutation count.
    pub fn set_pending(&self, pending: usize) {
        self.pending_tx.send_replace(pending);
    }

    /// Returns the last published pending-mutation count.
    pub fn pending(&self) -> usize {
        *self.pending_tx.borrow()
    }

    /// Subscribes to pending-count changes.
    pub fn subscribe_pending(&self) -> watch::Receiver<usize> {
        self.pending_tx.subscribe()
    }
}

impl Default for StatusHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_are_observable() {
        let handle = StatusHandle::new();
        let mut rx = handle.subscribe();
        assert_eq!(handle.current(), SyncStatus::Idle);

        handle.set(SyncStatus::Syncing);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SyncStatus::Syncing);
        assert!(handle.current().is_busy());

        handle.set(SyncStatus::Success);
        assert_eq!(handle.current(), SyncStatus::Success);
    }

    #[test]
    fn set_without_subscribers_is_fine() {
        let handle = StatusHandle::new();
        handle.set(SyncStatus::Error);
        assert_eq!(handle.current(), SyncStatus::Error);
    }

    #[test]
    fn pending_count_is_published_separately() {
        let handle = StatusHandle::new();
        let mut rx = handle.subscribe_pending();
        assert_eq!(handle.pending(), 0);

        handle.set_pending(4);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 4);

        handle.set_pending(0);
        assert_eq!(handle.pending(), 0);
    }
}
