//! Single-item, latest-wins hand-off between the capture loop and the
//! connection handlers.
//!
//! `publish` stores the segment and then wakes every task currently waiting,
//! after which the gate is closed again. A waiter that registers after the
//! wake-up sees a closed gate and waits for the following publish. Waiters
//! register before inspecting `current`, so a publish that lands between
//! the check and the wait is never missed.

use std::sync::Arc;

use cliprelay_core::{Segment, SegmentId};
use parking_lot::RwLock;
use tokio::sync::Notify;

/// Holder for the most recently completed segment.
#[derive(Default)]
pub struct SegmentSlot {
    current: RwLock<Option<Arc<Segment>>>,
    ready: Notify,
}

impl SegmentSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current segment and release every waiter.
    pub fn publish(&self, segment: Segment) -> Arc<Segment> {
        let segment = Arc::new(segment);
        *self.current.write() = Some(Arc::clone(&segment));
        self.ready.notify_waiters();
        segment
    }

    /// The latest segment, if any has been produced.
    pub fn current(&self) -> Option<Arc<Segment>> {
        self.current.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_none()
    }

    /// Wait for the first segment if none exists yet, otherwise return the
    /// current one immediately. Makes no freshness promise.
    pub async fn await_next(&self) -> Arc<Segment> {
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(segment) = self.current() {
                return segment;
            }
            notified.await;
        }
    }

    /// Return the current segment unless the caller already has it.
    ///
    /// If the slot is empty or its segment carries `requested`, block until
    /// the next publish and return whatever is current then. Otherwise
    /// return the current segment right away, however old it is.
    pub async fn peek_or_wait(&self, requested: SegmentId) -> Arc<Segment> {
        let mut woken = false;
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(segment) = self.current() {
                if woken || segment.id() != requested {
                    return segment;
                }
            }
            notified.await;
            woken = true;
        }
    }
}
