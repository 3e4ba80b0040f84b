//! Live subscription plumbing shared by all store backends.
//!
//! A [`Subscription`] is the receiving end held by a screen; a
//! [`SnapshotSender`] is the pushing end held by the backend. Cancelling is
//! immediate: once the handle is cancelled, [`Subscription::next`] returns
//! `None` even if events are still queued, and senders stop accepting events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tokio::task::AbortHandle;
use tracing::debug;

use super::{Snapshot, StoreError};

/// One delivery on a subscription: a full snapshot, or the error that ended
/// or interrupted the feed.
pub type SnapshotEvent = Result<Snapshot, StoreError>;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cloneable handle that can cancel a subscription from anywhere.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionHandle {
    state: Arc<CancelState>,
}

impl SubscriptionHandle {
    /// Create a new, active handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the subscription. Idempotent.
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_one();
        }
    }

    /// Check whether the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }
}

/// The backend side of a subscription.
#[derive(Debug, Clone)]
pub struct SnapshotSender {
    path: String,
    tx: mpsc::UnboundedSender<SnapshotEvent>,
    handle: SubscriptionHandle,
}

impl SnapshotSender {
    /// Collection path this sender feeds.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Push an event. Returns `false` once the subscription is gone, so the
    /// caller can drop this sender.
    pub fn send(&self, event: SnapshotEvent) -> bool {
        if self.handle.is_cancelled() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Whether the receiving side has been cancelled or dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.handle.is_cancelled() || self.tx.is_closed()
    }
}

/// A live feed of snapshots for one collection.
///
/// Dropping the subscription cancels it and stops any background task the
/// backend attached to it.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    events: mpsc::UnboundedReceiver<SnapshotEvent>,
    handle: SubscriptionHandle,
    task: Option<AbortHandle>,
}

impl Subscription {
    /// Create a connected sender/subscription pair for `path`.
    #[must_use]
    pub fn channel(path: impl Into<String>) -> (SnapshotSender, Self) {
        let path = path.into();
        let (tx, events) = mpsc::unbounded_channel();
        let handle = SubscriptionHandle::new();
        let sender = SnapshotSender {
            path: path.clone(),
            tx,
            handle: handle.clone(),
        };
        let subscription = Self {
            path,
            events,
            handle,
            task: None,
        };
        (sender, subscription)
    }

    /// Tie a background task to this subscription; it is aborted on cancel.
    #[must_use]
    pub fn with_task(mut self, task: AbortHandle) -> Self {
        self.task = Some(task);
        self
    }

    /// Collection path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// A handle that can cancel this subscription from another task.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Whether the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Wait for the next event.
    ///
    /// Returns `None` when the subscription is cancelled or the backend has
    /// stopped sending.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        if self.handle.is_cancelled() {
            return None;
        }
        let event = tokio::select! {
            biased;
            () = self.handle.state.notify.notified() => None,
            event = self.events.recv() => event,
        }?;
        // A cancel can land while the event was in flight.
        if self.handle.is_cancelled() {
            return None;
        }
        Some(event)
    }

    /// End the subscription explicitly.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.cancel();
        self.events.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        debug!(path = %self.path, "Subscription released");
    }
}
