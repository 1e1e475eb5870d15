//! Relay event system.
//!
//! [`RelayEventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so late subscribers (and tests) can catch up
//! on what the producer or consumer has been doing.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;

use crate::ids::{ConnectionId, SegmentId};

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// RelayEvent
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    // -- Producer ------------------------------------------------------------
    SegmentPublished {
        segment_id: SegmentId,
        bytes: usize,
    },
    CaptureFailed {
        error: String,
    },
    ClientConnected {
        connection_id: ConnectionId,
        peer: String,
    },
    ClientDisconnected {
        connection_id: ConnectionId,
        peer: String,
    },
    SegmentServed {
        connection_id: ConnectionId,
        segment_id: SegmentId,
    },

    // -- Consumer ------------------------------------------------------------
    SegmentReceived {
        segment_id: SegmentId,
        bytes: usize,
        truncated: bool,
    },
    Reconnecting {
        server: String,
        error: String,
    },
    PlaybackStarted {
        segment_id: SegmentId,
    },
    PlaybackFinished {
        segment_id: SegmentId,
    },
    PlaybackSkipped {
        segment_id: SegmentId,
    },
    Buffering,
}

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedEvent {
    pub timestamp: DateTime<Utc>,
    pub event: RelayEvent,
}

// ---------------------------------------------------------------------------
// RelayEventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct RelayEventBus {
    tx: broadcast::Sender<TimedEvent>,
    recent: RwLock<VecDeque<TimedEvent>>,
}

impl RelayEventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimedEvent> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn emit(&self, event: RelayEvent) {
        let timed = TimedEvent {
            timestamp: Utc::now(),
            event,
        };

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(timed.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(timed);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<RelayEvent> {
        let recent = self.recent.read();
        recent.iter().take(n).map(|t| t.event.clone()).collect()
    }
}

impl Default for RelayEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_and_receive() {
        let bus = RelayEventBus::new(16);
        let mut rx = bus.subscribe();

        let segment_id = SegmentId::new();
        bus.emit(RelayEvent::PlaybackStarted { segment_id });

        let timed = rx.try_recv().unwrap();
        assert_eq!(timed.event, RelayEvent::PlaybackStarted { segment_id });
    }

    #[test]
    fn recent_events_capped() {
        let bus = RelayEventBus::new(256);
        for _ in 0..150 {
            bus.emit(RelayEvent::Buffering);
        }
        assert_eq!(bus.recent_events(200).len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = RelayEventBus::new(16);
        let segment_id = SegmentId::new();
        bus.emit(RelayEvent::Buffering);
        bus.emit(RelayEvent::PlaybackSkipped { segment_id });

        let recent = bus.recent_events(2);
        assert_eq!(recent[0], RelayEvent::PlaybackSkipped { segment_id });
        assert_eq!(recent[1], RelayEvent::Buffering);
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = RelayEventBus::new(4);
        bus.emit(RelayEvent::CaptureFailed {
            error: "device unplugged".into(),
        });
    }

    #[test]
    fn event_serializes_with_tag() {
        let event = RelayEvent::SegmentReceived {
            segment_id: SegmentId::new(),
            bytes: 42,
            truncated: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"segment_received\""));
        let back: RelayEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
