//! Server → client response: `id (16 bytes) || payload`.

use bytes::{BufMut, Bytes, BytesMut};
use cliprelay_core::{Error, Result, Segment, SegmentId, SEGMENT_ID_LEN};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Serialize a segment into a single response frame.
pub fn encode_response(segment: &Segment) -> Bytes {
    let mut buf = BytesMut::with_capacity(SEGMENT_ID_LEN + segment.len());
    buf.put_slice(&segment.id().to_wire_bytes());
    buf.put_slice(segment.payload());
    buf.freeze()
}

/// Split a received message into id and payload.
///
/// The payload is everything after the first 16 bytes, possibly empty.
pub fn parse_response(mut buf: Bytes) -> Result<Segment> {
    if buf.len() < SEGMENT_ID_LEN {
        return Err(Error::Protocol(format!(
            "response too short for segment id: {} < {}",
            buf.len(),
            SEGMENT_ID_LEN
        )));
    }

    let payload = buf.split_off(SEGMENT_ID_LEN);
    let mut id_bytes = [0u8; SEGMENT_ID_LEN];
    id_bytes.copy_from_slice(&buf);

    Ok(Segment::with_id(SegmentId::from_wire_bytes(id_bytes), payload))
}

/// Write a segment as one response frame.
pub async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, segment: &Segment) -> Result<()> {
    writer.write_all(&encode_response(segment)).await?;
    writer.flush().await?;
    Ok(())
}
