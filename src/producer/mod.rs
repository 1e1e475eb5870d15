//! Producer side: capture loop, segment slot, listener.
//!
//! ```text
//! CaptureSource → CaptureLoop → SegmentSlot ← ConnectionHandler × N ← Listener
//! ```

pub mod capture;
pub mod listener;
pub mod slot;

pub use capture::{build_capture_source, CaptureLoop, CaptureSource, CommandSource, SyntheticSource};
pub use listener::{ConnectionHandler, Listener};
pub use slot::SegmentSlot;

use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use cliprelay_core::config::ProducerConfig;
use cliprelay_core::events::RelayEventBus;
use cliprelay_core::Result;
use tokio::task::JoinHandle;

/// A running producer: listener and capture loop on their own tasks.
pub struct RunningProducer {
    pub local_addr: SocketAddr,
    pub slot: Arc<SegmentSlot>,
    pub active_connections: Arc<AtomicUsize>,
    pub capture: JoinHandle<Result<()>>,
    pub listener: JoinHandle<Result<()>>,
}

impl RunningProducer {
    /// Wait for the listener. The capture loop dying is not fatal to it:
    /// handlers keep blocking until the process is torn down.
    pub async fn wait(self) -> Result<()> {
        match self.listener.await {
            Ok(result) => result,
            Err(e) => Err(cliprelay_core::Error::Internal(format!("listener task failed: {e}"))),
        }
    }
}

/// Bind the listener and start capturing.
pub async fn spawn(
    config: &ProducerConfig,
    source: Box<dyn CaptureSource>,
    events: Arc<RelayEventBus>,
) -> Result<RunningProducer> {
    let slot = Arc::new(SegmentSlot::new());

    let listener = Listener::bind(&config.bind_addr(), Arc::clone(&slot), Arc::clone(&events)).await?;
    let local_addr = listener.local_addr()?;
    let active_connections = listener.active_connections();

    let capture_loop = CaptureLoop::new(
        source,
        Arc::clone(&slot),
        config.segment_duration(),
        config.profile,
        events,
    );

    let capture = tokio::spawn(capture_loop.run());
    let listener = tokio::spawn(listener.run());

    Ok(RunningProducer {
        local_addr,
        slot,
        active_connections,
        capture,
        listener,
    })
}
