//! Client → server request: the text form of a segment id.

use cliprelay_core::{Error, Result, SegmentId};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Length of a hyphenated id on the wire (`8-4-4-4-12`).
pub const REQUEST_LEN: usize = 36;

/// Encode the id as its canonical hyphenated UTF-8 form. No terminator.
pub fn encode_request(id: SegmentId) -> Vec<u8> {
    id.to_string().into_bytes()
}

/// Decode a request body into the id the client last received.
///
/// Surrounding whitespace is tolerated; anything else that does not parse
/// as a UUID is an [`Error::InvalidRequest`].
pub fn decode_request(bytes: &[u8]) -> Result<SegmentId> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| Error::InvalidRequest(format!("{} bytes of non-UTF-8 data", bytes.len())))?;
    text.trim()
        .parse()
        .map_err(|_| Error::InvalidRequest(text.to_string()))
}

/// Send one request in a single write.
pub async fn write_request<W: AsyncWrite + Unpin>(writer: &mut W, id: SegmentId) -> Result<()> {
    writer.write_all(&encode_request(id)).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one fixed-length request.
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> Result<SegmentId> {
    let mut buf = [0u8; REQUEST_LEN];
    reader.read_exact(&mut buf).await?;
    decode_request(&buf)
}
