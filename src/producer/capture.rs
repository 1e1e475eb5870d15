//! Capture loop and capture sources.
//!
//! The loop alternates between recording (fixed wall-clock duration) and an
//! idle step of zero length: each finished recording is wrapped in a
//! [`Segment`] under a fresh id and published to the [`SegmentSlot`], and
//! the next recording starts straight away. A source error ends the loop for
//! good.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use cliprelay_core::config::{CaptureSourceKind, EncodingProfile, ProducerConfig};
use cliprelay_core::events::{RelayEvent, RelayEventBus};
use cliprelay_core::{Error, Result, Segment};
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::task::JoinHandle;

use super::slot::SegmentSlot;
use crate::command::CommandTemplate;

/// Extra time an encoder command gets to exit after the recording window.
const COMMAND_EXIT_GRACE: Duration = Duration::from_secs(30);

/// The capture/encode collaborator.
#[async_trait]
pub trait CaptureSource: Send {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Begin recording with the given encoding profile.
    async fn start_recording(&mut self, profile: EncodingProfile) -> Result<()>;

    /// Stop recording and hand back the encoded bytes.
    async fn stop_recording(&mut self) -> Result<Bytes>;
}

/// Build the capture source selected in the producer config.
pub fn build_capture_source(config: &ProducerConfig) -> Result<Box<dyn CaptureSource>> {
    match config.source {
        CaptureSourceKind::Synthetic => {
            Ok(Box::new(SyntheticSource::new(config.synthetic_payload_bytes)))
        }
        CaptureSourceKind::Command => {
            let template = config.command.as_deref().ok_or_else(|| {
                Error::Config("producer.source is 'command' but no command is set".into())
            })?;
            Ok(Box::new(CommandSource::new(
                CommandTemplate::parse(template)?,
                config.segment_duration(),
                config.device.clone(),
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureLoop
// ---------------------------------------------------------------------------

/// Drives a [`CaptureSource`] forever, publishing each recording.
pub struct CaptureLoop {
    source: Box<dyn CaptureSource>,
    slot: Arc<SegmentSlot>,
    duration: Duration,
    profile: EncodingProfile,
    events: Arc<RelayEventBus>,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn CaptureSource>,
        slot: Arc<SegmentSlot>,
        duration: Duration,
        profile: EncodingProfile,
        events: Arc<RelayEventBus>,
    ) -> Self {
        Self {
            source,
            slot,
            duration,
            profile,
            events,
        }
    }

    /// Run until the source fails. Only ever returns an error.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            source = self.source.name(),
            profile = %self.profile,
            duration_ms = self.duration.as_millis() as u64,
            "Capture loop started"
        );

        loop {
            if let Err(e) = self.record_one().await {
                tracing::error!(
                    source = self.source.name(),
                    "Capture failed, no further segments will be produced: {e}"
                );
                self.events.emit(RelayEvent::CaptureFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        }
    }

    async fn record_one(&mut self) -> Result<()> {
        tracing::debug!("Recording started");
        self.source.start_recording(self.profile).await?;
        tokio::time::sleep(self.duration).await;
        let payload = self.source.stop_recording().await?;

        let segment = self.slot.publish(Segment::new(payload));
        tracing::debug!(
            segment_id = %segment.id(),
            bytes = segment.len(),
            "Recording finished, segment published"
        );
        self.events.emit(RelayEvent::SegmentPublished {
            segment_id: segment.id(),
            bytes: segment.len(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SyntheticSource
// ---------------------------------------------------------------------------

/// Generates deterministic payloads without any capture hardware.
pub struct SyntheticSource {
    payload_bytes: usize,
    sequence: u64,
    recording: Option<EncodingProfile>,
    fail_after: Option<u64>,
}

impl SyntheticSource {
    pub fn new(payload_bytes: usize) -> Self {
        Self {
            payload_bytes,
            sequence: 0,
            recording: None,
            fail_after: None,
        }
    }

    /// A source whose device "disappears" after `segments` recordings.
    pub fn failing_after(payload_bytes: usize, segments: u64) -> Self {
        Self {
            fail_after: Some(segments),
            ..Self::new(payload_bytes)
        }
    }

    fn render(&self, profile: EncodingProfile) -> Bytes {
        let header = format!(
            "cliprelay synthetic segment {} {} {}\n",
            self.sequence,
            profile,
            profile.resolution()
        );
        let len = self.payload_bytes.max(header.len());
        let mut buf = BytesMut::with_capacity(len);
        buf.put_slice(header.as_bytes());
        let mut fill = self.sequence as u8;
        while buf.len() < len {
            buf.put_u8(fill);
            fill = fill.wrapping_add(1);
        }
        buf.freeze()
    }
}

#[async_trait]
impl CaptureSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn start_recording(&mut self, profile: EncodingProfile) -> Result<()> {
        if self.fail_after.is_some_and(|limit| self.sequence >= limit) {
            return Err(Error::capture(self.name(), "capture device lost"));
        }
        self.recording = Some(profile);
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<Bytes> {
        let profile = self
            .recording
            .take()
            .ok_or_else(|| Error::capture(self.name(), "stop requested while not recording"))?;
        let payload = self.render(profile);
        self.sequence += 1;
        Ok(payload)
    }
}

// ---------------------------------------------------------------------------
// CommandSource
// ---------------------------------------------------------------------------

struct Recording {
    child: Child,
    stdout: JoinHandle<std::io::Result<Vec<u8>>>,
}

/// Runs an external encoder once per segment and takes its stdout as the
/// payload. The command is expected to stop on its own after
/// `{duration_secs}`.
pub struct CommandSource {
    template: CommandTemplate,
    duration: Duration,
    device: Option<String>,
    recording: Option<Recording>,
}

impl CommandSource {
    pub fn new(template: CommandTemplate, duration: Duration, device: Option<String>) -> Self {
        Self {
            template,
            duration,
            device,
            recording: None,
        }
    }

    fn capture_error(&self, message: impl Into<String>) -> Error {
        Error::capture(self.template.program(), message)
    }
}

#[async_trait]
impl CaptureSource for CommandSource {
    fn name(&self) -> &str {
        self.template.program()
    }

    async fn start_recording(&mut self, profile: EncodingProfile) -> Result<()> {
        let duration_secs = format!("{:.3}", self.duration.as_secs_f64());
        let profile_name = profile.to_string();
        let device = self.device.clone().unwrap_or_default();
        let vars = [
            ("duration_secs", duration_secs.as_str()),
            ("device", device.as_str()),
            ("profile", profile_name.as_str()),
            ("resolution", profile.resolution()),
        ];

        let mut child = self
            .template
            .command(&vars, Stdio::null(), Stdio::piped())
            .spawn()
            .map_err(|e| self.capture_error(format!("failed to spawn: {e}")))?;

        // Drain stdout concurrently so the encoder never blocks on a full pipe.
        let mut out = child
            .stdout
            .take()
            .ok_or_else(|| self.capture_error("stdout not captured"))?;
        let stdout = tokio::spawn(async move {
            let mut buf = Vec::new();
            out.read_to_end(&mut buf).await.map(|_| buf)
        });

        tracing::trace!(program = self.template.program(), "Encoder spawned");
        self.recording = Some(Recording { child, stdout });
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<Bytes> {
        let Recording { mut child, stdout } = self
            .recording
            .take()
            .ok_or_else(|| self.capture_error("stop requested while not recording"))?;

        let status = match tokio::time::timeout(COMMAND_EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(self.capture_error(format!("wait failed: {e}"))),
            Err(_elapsed) => {
                let _ = child.kill().await;
                return Err(self.capture_error(format!(
                    "did not exit within {:?} of the recording window",
                    COMMAND_EXIT_GRACE
                )));
            }
        };

        if !status.success() {
            return Err(self.capture_error(format!("exited with status {status}")));
        }

        let bytes = stdout
            .await
            .map_err(|e| self.capture_error(format!("stdout reader panicked: {e}")))?
            .map_err(|e| self.capture_error(format!("failed to read stdout: {e}")))?;

        if bytes.is_empty() {
            return Err(self.capture_error("produced no output"));
        }
        Ok(Bytes::from(bytes))
    }
}
