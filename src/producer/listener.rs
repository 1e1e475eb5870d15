//! TCP listener and per-connection handlers.
//!
//! Every accepted socket gets its own task. A handler's failure (including
//! a client vanishing while it waits for the next segment) only ends that
//! task; the accept loop and the other handlers carry on.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cliprelay_core::events::{RelayEvent, RelayEventBus};
use cliprelay_core::{ConnectionId, Error, Result};
use tokio::net::{TcpListener, TcpStream};

use super::slot::SegmentSlot;

/// Accepts consumer connections and spawns a [`ConnectionHandler`] for each.
pub struct Listener {
    listener: TcpListener,
    slot: Arc<SegmentSlot>,
    events: Arc<RelayEventBus>,
    active: Arc<AtomicUsize>,
}

impl Listener {
    /// Bind the producer endpoint.
    pub async fn bind(
        addr: &str,
        slot: Arc<SegmentSlot>,
        events: Arc<RelayEventBus>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
        Ok(Self {
            listener,
            slot,
            events,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared counter of live connections.
    pub fn active_connections(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.active)
    }

    /// Accept forever. Returns only when `accept` itself fails.
    pub async fn run(self) -> Result<()> {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!("Listener started on {addr}");
        }

        loop {
            let (stream, peer) = self.listener.accept().await.map_err(|e| {
                tracing::error!("Accept failed, listener stopping: {e}");
                Error::from(e)
            })?;

            let handler = ConnectionHandler::new(
                stream,
                peer,
                Arc::clone(&self.slot),
                Arc::clone(&self.events),
                Arc::clone(&self.active),
            );
            tokio::spawn(handler.run());
        }
    }
}

/// Decrements the live-connection counter however the handler ends.
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serves one consumer connection: request id in, segment out, repeat.
///
/// Keeps no memory of what it sent before; freshness is decided entirely by
/// the id the client sends.
pub struct ConnectionHandler {
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
    slot: Arc<SegmentSlot>,
    events: Arc<RelayEventBus>,
    _active: ActiveGuard,
}

impl ConnectionHandler {
    fn new(
        stream: TcpStream,
        peer: SocketAddr,
        slot: Arc<SegmentSlot>,
        events: Arc<RelayEventBus>,
        active: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            stream,
            peer,
            slot,
            events,
            _active: ActiveGuard::new(active),
        }
    }

    pub async fn run(mut self) {
        tracing::info!(connection_id = %self.id, "Connection received from {}", self.peer);
        self.events.emit(RelayEvent::ClientConnected {
            connection_id: self.id,
            peer: self.peer.to_string(),
        });

        match self.serve().await {
            Ok(()) => {}
            Err(e) if e.is_disconnect() => {
                tracing::debug!(connection_id = %self.id, "Client {} disconnected: {e}", self.peer);
            }
            Err(e) => {
                tracing::warn!(connection_id = %self.id, "Connection to {} dropped: {e}", self.peer);
            }
        }

        self.events.emit(RelayEvent::ClientDisconnected {
            connection_id: self.id,
            peer: self.peer.to_string(),
        });
    }

    async fn serve(&mut self) -> Result<()> {
        let _ = self.stream.set_nodelay(true);
        cliprelay_wire::write_priming(&mut self.stream).await?;

        loop {
            let requested = cliprelay_wire::read_request(&mut self.stream).await?;
            tracing::debug!(connection_id = %self.id, %requested, "Segment requested");

            let segment = self.slot.peek_or_wait(requested).await;
            cliprelay_wire::write_response(&mut self.stream, &segment).await?;

            tracing::debug!(
                connection_id = %self.id,
                segment_id = %segment.id(),
                bytes = segment.len(),
                "Segment served"
            );
            self.events.emit(RelayEvent::SegmentServed {
                connection_id: self.id,
                segment_id: segment.id(),
            });
        }
    }
}
