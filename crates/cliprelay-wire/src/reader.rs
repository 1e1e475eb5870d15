//! Idle-terminated response reader.
//!
//! Responses have no length prefix, so a message ends when the peer stops
//! sending for `idle` (or closes the stream). Bytes beyond `max_bytes` are
//! read and dropped so the next response starts on a clean boundary.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use cliprelay_core::Result;
use tokio::io::{AsyncRead, AsyncReadExt};

const CHUNK_SIZE: usize = 64 * 1024;

/// One message as read off the socket, before id/payload parsing.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub bytes: Bytes,
    /// Bytes received past the cap and discarded.
    pub discarded: usize,
}

impl RawResponse {
    pub fn truncated(&self) -> bool {
        self.discarded > 0
    }
}

/// Reads one implicit-length response at a time.
#[derive(Debug, Clone, Copy)]
pub struct ResponseReader {
    max_bytes: usize,
    idle: Duration,
}

impl ResponseReader {
    pub fn new(max_bytes: usize, idle: Duration) -> Self {
        Self { max_bytes, idle }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Read the next response.
    ///
    /// Waits without a deadline for the first byte (the server may hold a
    /// request until the next segment is captured), then keeps reading until
    /// the stream is quiet for the idle window. EOF before any data is an
    /// `UnexpectedEof` I/O error; EOF after data ends the message.
    pub async fn read<R: AsyncRead + Unpin>(&self, reader: &mut R) -> Result<RawResponse> {
        let mut buf = BytesMut::with_capacity(self.max_bytes.min(CHUNK_SIZE));
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut discarded = 0usize;

        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream closed while waiting for response",
            )
            .into());
        }
        discarded += self.append(&mut buf, &chunk[..n]);

        loop {
            match tokio::time::timeout(self.idle, reader.read(&mut chunk)).await {
                Err(_elapsed) => break,
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => discarded += self.append(&mut buf, &chunk[..n]),
                Ok(Err(e)) => return Err(e.into()),
            }
        }

        if discarded > 0 {
            tracing::warn!(
                kept = buf.len(),
                discarded,
                cap = self.max_bytes,
                "Response exceeded buffer cap; truncated"
            );
        }

        Ok(RawResponse {
            bytes: buf.freeze(),
            discarded,
        })
    }

    /// Append up to the cap, returning how many bytes were dropped.
    fn append(&self, buf: &mut BytesMut, data: &[u8]) -> usize {
        let room = self.max_bytes.saturating_sub(buf.len());
        let take = room.min(data.len());
        buf.extend_from_slice(&data[..take]);
        data.len() - take
    }
}
