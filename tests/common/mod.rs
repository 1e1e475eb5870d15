//! Shared test harness for relay integration tests.
//!
//! Provides a producer endpoint whose slot the test publishes into by hand,
//! a consumer configuration tuned for fast loopback runs, and helpers for
//! waiting on relay events.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cliprelay::config::ConsumerConfig;
use cliprelay::producer::{Listener, SegmentSlot};
use cliprelay_core::events::{RelayEvent, RelayEventBus, TimedEvent};
use cliprelay_core::{Segment, SegmentId};
use tokio::sync::broadcast;

/// Producer endpoint on a random loopback port, without a capture loop.
pub struct ManualProducer {
    pub addr: SocketAddr,
    pub slot: Arc<SegmentSlot>,
    pub events: Arc<RelayEventBus>,
}

impl ManualProducer {
    pub async fn start() -> Self {
        let slot = Arc::new(SegmentSlot::new());
        let events = Arc::new(RelayEventBus::default());
        let listener = Listener::bind("127.0.0.1:0", Arc::clone(&slot), Arc::clone(&events))
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(listener.run());
        Self { addr, slot, events }
    }

    pub fn publish(&self, payload: &'static [u8]) -> Arc<Segment> {
        self.slot.publish(Segment::new(Bytes::from_static(payload)))
    }
}

/// Consumer settings for loopback tests: short idle window and backoff,
/// items that stay on screen far longer than any test runs.
pub fn fast_consumer_config(server: SocketAddr) -> ConsumerConfig {
    ConsumerConfig {
        server: server.to_string(),
        read_idle_ms: 30,
        buffer_poll_ms: 20,
        reconnect_initial_ms: 10,
        reconnect_max_ms: 50,
        clock_segment_ms: 60_000,
        ..ConsumerConfig::default()
    }
}

/// Wait for the next event matching `pick`, returning what it extracts.
pub async fn next_event<T>(
    rx: &mut broadcast::Receiver<TimedEvent>,
    mut pick: impl FnMut(&RelayEvent) -> Option<T>,
) -> T {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let timed = rx.recv().await.expect("event bus closed");
            if let Some(value) = pick(&timed.event) {
                return value;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Wait for the consumer to report a downloaded segment.
pub async fn next_received(rx: &mut broadcast::Receiver<TimedEvent>) -> (SegmentId, usize, bool) {
    next_event(rx, |event| match event {
        RelayEvent::SegmentReceived {
            segment_id,
            bytes,
            truncated,
        } => Some((*segment_id, *bytes, *truncated)),
        _ => None,
    })
    .await
}

/// Poll `cond` until it holds or five seconds pass.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
