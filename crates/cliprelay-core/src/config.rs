//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! producer and consumer sections. Every section defaults sensibly so a
//! completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Default producer port.
pub const DEFAULT_PORT: u16 = 13337;

/// Default receiver buffer cap: 10 MB.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10_000_000;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub producer: ProducerConfig,
    pub consumer: ConsumerConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Serialize back to TOML (used by `validate` to print the effective
    /// configuration).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(format!("config encode error: {e}")))
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.producer.port == 0 {
            warnings.push("producer.port is 0; a random port will be assigned".into());
        }

        if self.producer.segment_duration_ms < 1000 {
            warnings.push(format!(
                "producer.segment_duration_ms is {}; segments under a second may not be independently playable",
                self.producer.segment_duration_ms
            ));
        }

        if self.producer.source == CaptureSourceKind::Command && self.producer.command.is_none() {
            warnings.push("producer.source is 'command' but producer.command is not set".into());
        }

        if self.producer.source == CaptureSourceKind::Synthetic && self.producer.command.is_some() {
            warnings.push("producer.command is set but ignored by the synthetic source".into());
        }

        if self.consumer.skip_threshold == 0 {
            warnings.push("consumer.skip_threshold is 0; every download forces a skip".into());
        }

        if self.consumer.max_response_bytes < 1024 {
            warnings.push(format!(
                "consumer.max_response_bytes is {}; most segments will be truncated",
                self.consumer.max_response_bytes
            ));
        }

        if self.consumer.reconnect_initial_ms > self.consumer.reconnect_max_ms {
            warnings.push(
                "consumer.reconnect_initial_ms exceeds reconnect_max_ms; the maximum is used".into(),
            );
        }

        if self.consumer.sink == SinkKind::Command && self.consumer.player_command.is_none() {
            warnings.push("consumer.sink is 'command' but consumer.player_command is not set".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

/// Encoding profile requested from the capture source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingProfile {
    /// 640x480 MP4.
    #[default]
    Vga,
    /// 1280x720 MP4.
    Hd720,
    /// 1920x1080 MP4.
    Hd1080,
}

impl EncodingProfile {
    /// Frame size as `WIDTHxHEIGHT`.
    pub fn resolution(&self) -> &'static str {
        match self {
            EncodingProfile::Vga => "640x480",
            EncodingProfile::Hd720 => "1280x720",
            EncodingProfile::Hd1080 => "1920x1080",
        }
    }
}

impl fmt::Display for EncodingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncodingProfile::Vga => "vga",
            EncodingProfile::Hd720 => "hd720",
            EncodingProfile::Hd1080 => "hd1080",
        };
        f.write_str(name)
    }
}

/// Which capture collaborator the producer drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSourceKind {
    /// Generated payloads, no hardware required.
    #[default]
    Synthetic,
    /// An external encoder command writes each segment to stdout.
    Command,
}

/// Producer (capture + listener) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub host: String,
    pub port: u16,
    /// Length of each recording.
    pub segment_duration_ms: u64,
    pub profile: EncodingProfile,
    /// Preferred capture device name, substituted into `{device}`.
    pub device: Option<String>,
    pub source: CaptureSourceKind,
    /// Capture command template. Placeholders: `{duration_secs}`,
    /// `{device}`, `{profile}`, `{resolution}`.
    pub command: Option<String>,
    #[serde(default = "default_synthetic_payload_bytes")]
    pub synthetic_payload_bytes: usize,
}

fn default_synthetic_payload_bytes() -> usize {
    64 * 1024
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            segment_duration_ms: 5000,
            profile: EncodingProfile::default(),
            device: None,
            source: CaptureSourceKind::default(),
            command: None,
            synthetic_payload_bytes: default_synthetic_payload_bytes(),
        }
    }
}

impl ProducerConfig {
    pub fn segment_duration(&self) -> Duration {
        Duration::from_millis(self.segment_duration_ms)
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Which render collaborator the consumer drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Headless: each item "plays" for a fixed duration.
    #[default]
    Clock,
    /// Each segment is piped into an external player process.
    Command,
}

/// Consumer (download + playback) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Producer endpoint as `host:port`.
    pub server: String,
    /// Receiver buffer cap; larger payloads are truncated.
    pub max_response_bytes: usize,
    /// A response is complete once the socket has been quiet this long.
    pub read_idle_ms: u64,
    /// Queue depth above which the driver is forced to skip.
    pub skip_threshold: usize,
    pub buffer_poll_ms: u64,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    pub sink: SinkKind,
    /// Player command, segment bytes are written to its stdin.
    pub player_command: Option<String>,
    /// How long the clock sink treats each item as playing.
    pub clock_segment_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            server: format!("127.0.0.1:{DEFAULT_PORT}"),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            read_idle_ms: 250,
            skip_threshold: 2,
            buffer_poll_ms: 500,
            reconnect_initial_ms: 100,
            reconnect_max_ms: 5000,
            sink: SinkKind::default(),
            player_command: None,
            clock_segment_ms: 5000,
        }
    }
}

impl ConsumerConfig {
    pub fn read_idle(&self) -> Duration {
        Duration::from_millis(self.read_idle_ms)
    }

    pub fn buffer_poll(&self) -> Duration {
        Duration::from_millis(self.buffer_poll_ms)
    }

    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms.min(self.reconnect_max_ms))
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }

    pub fn clock_segment(&self) -> Duration {
        Duration::from_millis(self.clock_segment_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.producer.host, "0.0.0.0");
        assert_eq!(cfg.producer.port, 13337);
        assert_eq!(cfg.producer.segment_duration(), Duration::from_secs(5));
        assert_eq!(cfg.producer.profile, EncodingProfile::Vga);
        assert_eq!(cfg.consumer.max_response_bytes, 10_000_000);
        assert_eq!(cfg.consumer.skip_threshold, 2);
        assert_eq!(cfg.consumer.buffer_poll(), Duration::from_millis(500));
    }

    #[test]
    fn default_config_no_warnings() {
        let warnings = Config::default().validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.producer.port, DEFAULT_PORT);
        assert_eq!(cfg.consumer.server, "127.0.0.1:13337");
    }

    #[test]
    fn parse_partial_sections() {
        let cfg = Config::from_toml(
            r#"
            [producer]
            port = 9000
            profile = "hd720"
            source = "command"
            command = "ffmpeg -t {duration_secs} -f mp4 -"

            [consumer]
            skip_threshold = 4
            sink = "command"
            player_command = "ffplay -autoexit -"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.producer.port, 9000);
        assert_eq!(cfg.producer.profile, EncodingProfile::Hd720);
        assert_eq!(cfg.producer.source, CaptureSourceKind::Command);
        assert_eq!(cfg.producer.synthetic_payload_bytes, 64 * 1024);
        assert_eq!(cfg.consumer.skip_threshold, 4);
        assert_eq!(cfg.consumer.sink, SinkKind::Command);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn unknown_profile_rejected() {
        let err = Config::from_toml("[producer]\nprofile = \"8k\"\n").unwrap_err();
        assert!(err.to_string().contains("config parse error"));
    }

    #[test]
    fn command_source_without_template_warns() {
        let mut cfg = Config::default();
        cfg.producer.source = CaptureSourceKind::Command;
        assert!(cfg.validate().iter().any(|w| w.contains("producer.command")));
    }

    #[test]
    fn zero_threshold_warns() {
        let mut cfg = Config::default();
        cfg.consumer.skip_threshold = 0;
        assert!(cfg.validate().iter().any(|w| w.contains("skip_threshold")));
    }

    #[test]
    fn reconnect_initial_clamped_to_max() {
        let mut cfg = Config::default();
        cfg.consumer.reconnect_initial_ms = 10_000;
        cfg.consumer.reconnect_max_ms = 2_000;
        assert_eq!(cfg.consumer.reconnect_initial(), Duration::from_secs(2));
        assert!(cfg.validate().iter().any(|w| w.contains("reconnect")));
    }

    #[test]
    fn toml_roundtrip_preserves_values() {
        let mut cfg = Config::default();
        cfg.producer.device = Some("LifeCam".into());
        let text = cfg.to_toml().unwrap();
        let back = Config::from_toml(&text).unwrap();
        assert_eq!(back.producer.device.as_deref(), Some("LifeCam"));
    }

    #[test]
    fn profile_resolution() {
        assert_eq!(EncodingProfile::Vga.resolution(), "640x480");
        assert_eq!(EncodingProfile::Hd1080.to_string(), "hd1080");
    }
}
