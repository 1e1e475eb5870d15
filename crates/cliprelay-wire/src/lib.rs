//! cliprelay-wire: the segment relay wire protocol.
//!
//! The protocol runs over one persistent, reliable byte stream:
//!
//! ```text
//! server → client   1 byte priming byte, once, right after accept
//! client → server   36 bytes  UTF-8 hyphenated id of the last segment received
//! server → client   16 bytes  segment id (GUID byte layout) ┐ one write,
//!                   N bytes   payload                        ┘ no length prefix
//! ```
//!
//! Responses carry no explicit length. The receiver reads until the socket
//! has been idle for a short window (or the peer closes), so the maximum
//! segment size is bounded only by the receiver's buffer cap. This is a
//! known weakness kept for compatibility with existing peers.

mod reader;
mod request;
mod response;

pub use reader::{RawResponse, ResponseReader};
pub use request::{decode_request, encode_request, read_request, write_request, REQUEST_LEN};
pub use response::{encode_response, parse_response, write_response};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Value of the single byte the server writes right after accepting.
pub const PRIMING_BYTE: u8 = 0x00;

/// Write the priming byte that lets a freshly connected client start its
/// request loop.
pub async fn write_priming<W: AsyncWrite + Unpin>(writer: &mut W) -> cliprelay_core::Result<()> {
    writer.write_all(&[PRIMING_BYTE]).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and discard the priming byte. Its value is not checked.
pub async fn read_priming<R: AsyncRead + Unpin>(reader: &mut R) -> cliprelay_core::Result<()> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte).await?;
    tracing::trace!(value = byte[0], "Priming byte received");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn priming_roundtrip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_priming(&mut server).await.unwrap();
        read_priming(&mut client).await.unwrap();
    }

    #[tokio::test]
    async fn priming_read_fails_on_closed_stream() {
        let (mut client, server) = tokio::io::duplex(64);
        drop(server);
        let err = read_priming(&mut client).await.unwrap_err();
        assert!(err.is_disconnect());
    }
}
