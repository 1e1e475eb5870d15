//! Playback driver: turns the queue into continuous playback.
//!
//! ```text
//!            queue non-empty (poll / kick)
//!  Buffering ─────────────────────────────▶ Playing
//!      ▲                                      │ ended / skip → pop head
//!      └────────── queue now empty ◀──────────┘
//! ```
//!
//! The driver owns the sink. The download loop talks to it through a
//! [`PlaybackHandle`]: `kick` asks it to start if idle, `skip` abandons the
//! playing item.

use std::sync::Arc;
use std::time::Duration;

use cliprelay_core::events::{RelayEvent, RelayEventBus};
use tokio::sync::{mpsc, watch};

use super::queue::PlaybackQueue;
use super::sink::{RenderSink, SinkState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Queue empty, waiting for data.
    Buffering,
    /// Rendering the head of the queue.
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCommand {
    /// Start playback if not already playing.
    Kick,
    /// Abandon the playing item and move to the next.
    Skip,
}

/// Cloneable control surface for a running [`PlaybackDriver`].
#[derive(Clone)]
pub struct PlaybackHandle {
    queue: Arc<PlaybackQueue>,
    commands: mpsc::UnboundedSender<DriverCommand>,
    state: watch::Receiver<DriverState>,
}

impl PlaybackHandle {
    pub fn queue(&self) -> &Arc<PlaybackQueue> {
        &self.queue
    }

    pub fn state(&self) -> DriverState {
        *self.state.borrow()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == DriverState::Playing
    }

    pub fn kick(&self) {
        let _ = self.commands.send(DriverCommand::Kick);
    }

    pub fn skip(&self) {
        let _ = self.commands.send(DriverCommand::Skip);
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<DriverState> {
        self.state.clone()
    }
}

pub struct PlaybackDriver {
    queue: Arc<PlaybackQueue>,
    sink: Box<dyn RenderSink>,
    poll: Duration,
    events: Arc<RelayEventBus>,
    commands: mpsc::UnboundedReceiver<DriverCommand>,
    state: watch::Sender<DriverState>,
}

impl PlaybackDriver {
    pub fn new(
        queue: Arc<PlaybackQueue>,
        sink: Box<dyn RenderSink>,
        poll: Duration,
        events: Arc<RelayEventBus>,
    ) -> (Self, PlaybackHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(DriverState::Buffering);
        let handle = PlaybackHandle {
            queue: Arc::clone(&queue),
            commands: tx,
            state: state_rx,
        };
        let driver = Self {
            queue,
            sink,
            poll,
            events,
            commands: rx,
            state: state_tx,
        };
        (driver, handle)
    }

    /// Drive playback for the life of the process.
    pub async fn run(mut self) {
        tracing::info!(sink = self.sink.name(), "Playback driver started");
        loop {
            let state = *self.state.borrow();
            match state {
                DriverState::Buffering => self.buffering_step().await,
                DriverState::Playing => self.playing_step().await,
            }
        }
    }

    async fn buffering_step(&mut self) {
        tokio::select! {
            _ = tokio::time::sleep(self.poll) => {}
            // Nothing is playing, so a skip has nothing to abandon; it just
            // means data arrived.
            _ = next_command(&mut self.commands) => {}
        }
        if !self.queue.is_empty() {
            self.start_head().await;
        }
    }

    async fn playing_step(&mut self) {
        tokio::select! {
            _ = self.sink.ended() => {
                if let Some(done) = self.queue.pop_front() {
                    tracing::debug!(segment_id = %done.id(), "Playback finished");
                    self.events.emit(RelayEvent::PlaybackFinished { segment_id: done.id() });
                }
                self.start_head().await;
            }
            cmd = next_command(&mut self.commands) => match cmd {
                DriverCommand::Skip => {
                    if let Some(skipped) = self.queue.pop_front() {
                        tracing::debug!(
                            segment_id = %skipped.id(),
                            depth = self.queue.len(),
                            "Skipping ahead to relieve backlog"
                        );
                        self.events.emit(RelayEvent::PlaybackSkipped { segment_id: skipped.id() });
                    }
                    self.start_head().await;
                }
                DriverCommand::Kick => {
                    if self.sink.state() != SinkState::Playing {
                        if let Err(e) = self.sink.play().await {
                            tracing::warn!(sink = self.sink.name(), "Resume failed: {e}");
                        }
                    }
                }
            },
        }
    }

    /// Start the head of the queue, dropping items the sink refuses.
    /// Leaves the driver `Playing` on success, `Buffering` once the queue
    /// runs dry.
    async fn start_head(&mut self) {
        while let Some(head) = self.queue.head() {
            let started = match self.sink.set_source(Arc::clone(&head)).await {
                Ok(()) => self.sink.play().await,
                Err(e) => Err(e),
            };
            match started {
                Ok(()) => {
                    tracing::debug!(
                        segment_id = %head.id(),
                        bytes = head.len(),
                        depth = self.queue.len(),
                        "Playback started"
                    );
                    self.events.emit(RelayEvent::PlaybackStarted { segment_id: head.id() });
                    self.set_state(DriverState::Playing);
                    return;
                }
                Err(e) => {
                    tracing::warn!(segment_id = %head.id(), "Item failed, skipping: {e}");
                    self.queue.pop_front();
                    self.events.emit(RelayEvent::PlaybackSkipped { segment_id: head.id() });
                }
            }
        }

        if let Err(e) = self.sink.stop().await {
            tracing::warn!(sink = self.sink.name(), "Stop failed: {e}");
        }
        if *self.state.borrow() != DriverState::Buffering {
            tracing::debug!("Queue drained, buffering");
            self.events.emit(RelayEvent::Buffering);
        }
        self.set_state(DriverState::Buffering);
    }

    fn set_state(&self, state: DriverState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

/// Next command, or pending forever once every handle is gone.
async fn next_command(rx: &mut mpsc::UnboundedReceiver<DriverCommand>) -> DriverCommand {
    match rx.recv().await {
        Some(cmd) => cmd,
        None => std::future::pending().await,
    }
}
