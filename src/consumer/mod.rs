//! Consumer side: download loop, playback queue, driver, render sinks.
//!
//! ```text
//! producer ──TCP──▶ DownloadLoop ──push──▶ PlaybackQueue ◀──pop── PlaybackDriver ──▶ RenderSink
//!                        └──────── kick / skip (PlaybackHandle) ─────────┘
//! ```

pub mod download;
pub mod driver;
pub mod queue;
pub mod sink;

pub use download::{Backoff, DownloadLoop};
pub use driver::{DriverCommand, DriverState, PlaybackDriver, PlaybackHandle};
pub use queue::PlaybackQueue;
pub use sink::{build_sink, ClockSink, CommandSink, RenderSink, SinkState};

use std::sync::Arc;

use cliprelay_core::config::ConsumerConfig;
use cliprelay_core::events::RelayEventBus;
use tokio::task::JoinHandle;

/// A running consumer: download loop and playback driver on their own tasks.
pub struct RunningConsumer {
    pub handle: PlaybackHandle,
    pub download: JoinHandle<()>,
    pub driver: JoinHandle<()>,
}

impl RunningConsumer {
    /// Stop both tasks.
    pub fn abort(&self) {
        self.download.abort();
        self.driver.abort();
    }
}

pub fn spawn(
    config: &ConsumerConfig,
    sink: Box<dyn RenderSink>,
    events: Arc<RelayEventBus>,
) -> RunningConsumer {
    let queue = Arc::new(PlaybackQueue::new());
    let (driver, handle) =
        PlaybackDriver::new(queue, sink, config.buffer_poll(), Arc::clone(&events));
    let download = DownloadLoop::new(config, handle.clone(), events);

    RunningConsumer {
        handle,
        download: tokio::spawn(download.run()),
        driver: tokio::spawn(driver.run()),
    }
}
