//! Download loop: fetch segments from the producer and feed the queue.
//!
//! Connects, performs the priming read, then repeatedly sends the last id it
//! received and reads the next segment. Any failure abandons the connection
//! and starts over with a fresh connect. The last-known id survives
//! reconnects so the producer does not resend what was already queued.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use cliprelay_core::config::ConsumerConfig;
use cliprelay_core::events::{RelayEvent, RelayEventBus};
use cliprelay_core::{Result, Segment, SegmentId};
use cliprelay_wire::{parse_response, read_priming, write_request, ResponseReader};
use tokio::net::TcpStream;

use super::driver::PlaybackHandle;

/// Doubling retry delay, capped.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following call returns twice as much.
    pub fn next(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

pub struct DownloadLoop {
    server: String,
    reader: ResponseReader,
    skip_threshold: usize,
    backoff: Backoff,
    handle: PlaybackHandle,
    events: Arc<RelayEventBus>,
}

impl DownloadLoop {
    pub fn new(config: &ConsumerConfig, handle: PlaybackHandle, events: Arc<RelayEventBus>) -> Self {
        Self {
            server: config.server.clone(),
            reader: ResponseReader::new(config.max_response_bytes, config.read_idle()),
            skip_threshold: config.skip_threshold,
            backoff: Backoff::new(config.reconnect_initial(), config.reconnect_max()),
            handle,
            events,
        }
    }

    /// Run for the life of the process.
    pub async fn run(mut self) {
        // Placeholder: never matches a real segment, so the first response
        // is whatever the producer holds.
        let mut last_id = SegmentId::new();
        tracing::info!(server = %self.server, placeholder = %last_id, "Download loop started");

        loop {
            let mut stream = self.connect().await;
            match self.session(&mut stream, &mut last_id).await {
                Ok(never) => match never {},
                Err(e) => {
                    if e.is_disconnect() {
                        tracing::info!(server = %self.server, "Connection lost: {e}");
                    } else {
                        tracing::warn!(server = %self.server, "Connection abandoned: {e}");
                    }
                    self.events.emit(RelayEvent::Reconnecting {
                        server: self.server.clone(),
                        error: e.to_string(),
                    });
                }
            }
            drop(stream);
            tokio::time::sleep(self.backoff.next()).await;
        }
    }

    /// Connect, retrying until the producer answers.
    async fn connect(&mut self) -> TcpStream {
        loop {
            match TcpStream::connect(&self.server).await {
                Ok(stream) => {
                    tracing::info!(server = %self.server, "Connected");
                    return stream;
                }
                Err(e) => {
                    let delay = self.backoff.next();
                    tracing::debug!(
                        server = %self.server,
                        retry_in_ms = delay.as_millis() as u64,
                        "Connect failed: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn session(&mut self, stream: &mut TcpStream, last_id: &mut SegmentId) -> Result<Infallible> {
        let _ = stream.set_nodelay(true);
        read_priming(stream).await?;

        loop {
            write_request(stream, *last_id).await?;
            let raw = self.reader.read(stream).await?;
            let truncated = raw.truncated();
            let segment = parse_response(raw.bytes)?;

            if segment.id() == *last_id {
                tracing::debug!(segment_id = %segment.id(), "Producer repeated the last segment");
            }
            *last_id = segment.id();
            self.backoff.reset();
            self.deliver(segment, truncated);
        }
    }

    /// Enqueue, apply backpressure, and make sure playback is running.
    fn deliver(&self, segment: Segment, truncated: bool) {
        let id = segment.id();
        let bytes = segment.len();
        self.events.emit(RelayEvent::SegmentReceived {
            segment_id: id,
            bytes,
            truncated,
        });

        let queue = self.handle.queue();
        if !queue.push(Arc::new(segment)) {
            tracing::debug!(segment_id = %id, "Already queued, dropping duplicate");
        }
        let depth = queue.len();
        tracing::debug!(segment_id = %id, bytes, depth, "Segment downloaded");

        if depth > self.skip_threshold {
            self.handle.skip();
        }
        if !self.handle.is_playing() {
            self.handle.kick();
        }
    }
}
