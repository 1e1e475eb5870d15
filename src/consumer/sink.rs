//! Render sinks: where queued segments are actually played.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cliprelay_core::config::{ConsumerConfig, SinkKind};
use cliprelay_core::{Error, Result, Segment, SegmentId};
use tokio::io::AsyncWriteExt;
use tokio::process::Child;
use tokio::time::Instant;

use crate::command::CommandTemplate;

/// What the sink is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Nothing loaded.
    Idle,
    /// A source is loaded but not started.
    Ready,
    Playing,
}

/// The render collaborator driven by the playback driver.
#[async_trait]
pub trait RenderSink: Send {
    fn name(&self) -> &str;

    /// Load a segment, replacing (and stopping) whatever was loaded.
    async fn set_source(&mut self, segment: Arc<Segment>) -> Result<()>;

    /// Start the loaded source. A no-op when already playing.
    async fn play(&mut self) -> Result<()>;

    /// Stop and unload.
    async fn stop(&mut self) -> Result<()>;

    fn state(&self) -> SinkState;

    /// Resolve once the playing item has finished on its own. Stays pending
    /// while nothing is playing. Must be cancel safe: the driver races it
    /// against skip requests.
    async fn ended(&mut self);
}

/// Build the sink selected in the consumer config.
pub fn build_sink(config: &ConsumerConfig) -> Result<Box<dyn RenderSink>> {
    match config.sink {
        SinkKind::Clock => Ok(Box::new(ClockSink::new(config.clock_segment()))),
        SinkKind::Command => {
            let template = config.player_command.as_deref().ok_or_else(|| {
                Error::Config("consumer.sink is 'command' but no player_command is set".into())
            })?;
            Ok(Box::new(CommandSink::new(CommandTemplate::parse(template)?)))
        }
    }
}

// ---------------------------------------------------------------------------
// ClockSink
// ---------------------------------------------------------------------------

/// Headless sink: every item plays for a fixed duration.
pub struct ClockSink {
    duration: Duration,
    loaded: Option<SegmentId>,
    deadline: Option<Instant>,
}

impl ClockSink {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            loaded: None,
            deadline: None,
        }
    }
}

#[async_trait]
impl RenderSink for ClockSink {
    fn name(&self) -> &str {
        "clock"
    }

    async fn set_source(&mut self, segment: Arc<Segment>) -> Result<()> {
        self.loaded = Some(segment.id());
        self.deadline = None;
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        if self.loaded.is_none() {
            return Err(Error::render(self.name(), "play requested with no source"));
        }
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.duration);
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.loaded = None;
        self.deadline = None;
        Ok(())
    }

    fn state(&self) -> SinkState {
        match (self.loaded, self.deadline) {
            (None, _) => SinkState::Idle,
            (Some(_), None) => SinkState::Ready,
            (Some(_), Some(_)) => SinkState::Playing,
        }
    }

    async fn ended(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.loaded = None;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// CommandSink
// ---------------------------------------------------------------------------

/// Pipes each segment into a fresh external player process, e.g.
/// `ffplay -autoexit -loglevel quiet -`. The item ends when the player
/// exits.
pub struct CommandSink {
    template: CommandTemplate,
    loaded: Option<Arc<Segment>>,
    player: Option<Child>,
}

impl CommandSink {
    pub fn new(template: CommandTemplate) -> Self {
        Self {
            template,
            loaded: None,
            player: None,
        }
    }

    async fn kill_player(&mut self) {
        if let Some(mut child) = self.player.take() {
            let _ = child.kill().await;
        }
    }
}

#[async_trait]
impl RenderSink for CommandSink {
    fn name(&self) -> &str {
        self.template.program()
    }

    async fn set_source(&mut self, segment: Arc<Segment>) -> Result<()> {
        self.kill_player().await;
        self.loaded = Some(segment);
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        if self.player.is_some() {
            return Ok(());
        }
        let segment = self
            .loaded
            .clone()
            .ok_or_else(|| Error::render(self.name(), "play requested with no source"))?;

        let segment_id = segment.id().to_string();
        let mut child = self
            .template
            .command(&[("segment_id", segment_id.as_str())], Stdio::piped(), Stdio::null())
            .spawn()
            .map_err(|e| Error::render(self.name(), format!("failed to spawn: {e}")))?;

        // Feed the payload in the background; a player that quits early
        // just closes the pipe.
        if let Some(mut stdin) = child.stdin.take() {
            let payload = segment.payload().clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&payload).await {
                    tracing::debug!("Player stdin closed early: {e}");
                }
            });
        }

        self.player = Some(child);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.kill_player().await;
        self.loaded = None;
        Ok(())
    }

    fn state(&self) -> SinkState {
        match (&self.loaded, &self.player) {
            (_, Some(_)) => SinkState::Playing,
            (Some(_), None) => SinkState::Ready,
            (None, None) => SinkState::Idle,
        }
    }

    async fn ended(&mut self) {
        let Some(child) = self.player.as_mut() else {
            return std::future::pending().await;
        };
        match child.wait().await {
            Ok(status) if !status.success() => {
                tracing::warn!(player = self.template.program(), "Player exited with {status}");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(player = self.template.program(), "Waiting on player failed: {e}"),
        }
        self.player = None;
        self.loaded = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn seg() -> Arc<Segment> {
        Arc::new(Segment::new(Bytes::from_static(b"payload")))
    }

    #[tokio::test]
    async fn clock_sink_lifecycle() {
        let mut sink = ClockSink::new(Duration::from_millis(30));
        assert_eq!(sink.state(), SinkState::Idle);

        sink.set_source(seg()).await.unwrap();
        assert_eq!(sink.state(), SinkState::Ready);

        sink.play().await.unwrap();
        assert_eq!(sink.state(), SinkState::Playing);

        tokio::time::timeout(Duration::from_secs(1), sink.ended())
            .await
            .unwrap();
        assert_eq!(sink.state(), SinkState::Idle);
    }

    #[tokio::test]
    async fn clock_sink_play_is_idempotent() {
        let mut sink = ClockSink::new(Duration::from_millis(100));
        sink.set_source(seg()).await.unwrap();
        sink.play().await.unwrap();
        let first = sink.deadline;
        tokio::time::sleep(Duration::from_millis(10)).await;
        sink.play().await.unwrap();
        assert_eq!(sink.deadline, first);
    }

    #[tokio::test]
    async fn clock_sink_without_source_never_ends() {
        let mut sink = ClockSink::new(Duration::from_millis(1));
        assert!(sink.play().await.is_err());
        let res = tokio::time::timeout(Duration::from_millis(50), sink.ended()).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn clock_sink_ended_survives_cancellation() {
        let mut sink = ClockSink::new(Duration::from_millis(80));
        sink.set_source(seg()).await.unwrap();
        sink.play().await.unwrap();

        // Racing `ended` against a shorter timer must not lose the deadline.
        let _ = tokio::time::timeout(Duration::from_millis(10), sink.ended()).await;
        assert_eq!(sink.state(), SinkState::Playing);
        tokio::time::timeout(Duration::from_secs(1), sink.ended())
            .await
            .unwrap();
        assert_eq!(sink.state(), SinkState::Idle);
    }

    #[test]
    fn command_sink_requires_player() {
        let mut config = ConsumerConfig::default();
        config.sink = SinkKind::Command;
        assert!(build_sink(&config).is_err());

        config.player_command = Some("ffplay -autoexit -".into());
        assert_eq!(build_sink(&config).unwrap().name(), "ffplay");
    }

    #[tokio::test]
    async fn command_sink_ends_when_player_exits() {
        let mut sink = CommandSink::new(CommandTemplate::parse("cat").unwrap());
        sink.set_source(seg()).await.unwrap();
        if sink.play().await.is_err() {
            // `cat` unavailable on this system.
            return;
        }
        assert_eq!(sink.state(), SinkState::Playing);
        tokio::time::timeout(Duration::from_secs(5), sink.ended())
            .await
            .unwrap();
        assert_eq!(sink.state(), SinkState::Idle);
    }

    #[tokio::test]
    async fn command_sink_missing_player_is_render_error() {
        let mut sink =
            CommandSink::new(CommandTemplate::parse("nonexistent_player_xyz_12345").unwrap());
        sink.set_source(seg()).await.unwrap();
        let err = sink.play().await.unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
    }
}
