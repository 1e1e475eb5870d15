//! Concurrent FIFO of segments awaiting playback.
//!
//! The download loop appends at the tail, the playback driver pops from the
//! head. The head stays in the queue while it plays, so `len()` counts the
//! item on screen plus everything behind it.

use std::collections::VecDeque;
use std::sync::Arc;

use cliprelay_core::{Segment, SegmentId};
use parking_lot::Mutex;

#[derive(Default)]
pub struct PlaybackQueue {
    items: Mutex<VecDeque<Arc<Segment>>>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment unless one with the same id is already queued.
    /// Returns whether it was added.
    pub fn push(&self, segment: Arc<Segment>) -> bool {
        let mut items = self.items.lock();
        if items.iter().any(|s| s.id() == segment.id()) {
            return false;
        }
        items.push_back(segment);
        true
    }

    pub fn head(&self) -> Option<Arc<Segment>> {
        self.items.lock().front().cloned()
    }

    pub fn pop_front(&self) -> Option<Arc<Segment>> {
        self.items.lock().pop_front()
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.items.lock().iter().any(|s| s.id() == id)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Ids in playback order.
    pub fn ids(&self) -> Vec<SegmentId> {
        self.items.lock().iter().map(|s| s.id()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn seg() -> Arc<Segment> {
        Arc::new(Segment::new(Bytes::from_static(b"x")))
    }

    #[test]
    fn fifo_order() {
        let queue = PlaybackQueue::new();
        let (a, b, c) = (seg(), seg(), seg());
        assert!(queue.push(Arc::clone(&a)));
        assert!(queue.push(Arc::clone(&b)));
        assert!(queue.push(Arc::clone(&c)));

        assert_eq!(queue.ids(), vec![a.id(), b.id(), c.id()]);
        assert_eq!(queue.head().unwrap().id(), a.id());
        assert_eq!(queue.pop_front().unwrap().id(), a.id());
        assert_eq!(queue.pop_front().unwrap().id(), b.id());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let queue = PlaybackQueue::new();
        let a = seg();
        assert!(queue.push(Arc::clone(&a)));
        assert!(!queue.push(Arc::new(Segment::with_id(a.id(), Bytes::from_static(b"again")))));
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(a.id()));

        // Once played out, the same id may be queued again.
        queue.pop_front();
        assert!(queue.push(a));
    }

    #[test]
    fn empty_queue() {
        let queue = PlaybackQueue::new();
        assert!(queue.is_empty());
        assert!(queue.head().is_none());
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn concurrent_push_and_pop_keep_ids_distinct() {
        let queue = Arc::new(PlaybackQueue::new());
        let shared: Vec<_> = (0..50).map(|_| seg()).collect();

        let pushers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for s in shared {
                        queue.push(s);
                    }
                })
            })
            .collect();
        for p in pushers {
            p.join().unwrap();
        }

        let ids = queue.ids();
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(ids.len(), unique.len());
        assert_eq!(ids.len(), 50);
    }
}
