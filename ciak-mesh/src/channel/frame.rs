//! Newline-delimited frame encoding/decoding
//!
//! Wire format: one UTF-8 JSON object per line, terminated by `\n`.
//! Maximum line size: 1MB (sanity limit)

use ciak_core::FramedMessage;
use ciak_core::codec;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{MeshError, Result};

/// Maximum allowed line size (1MB), newline excluded
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Read one raw line, without its terminator.
///
/// EOF before any byte is `ChannelClosed`. An oversized line is skipped up
/// to its newline and reported as `Protocol`, so the next call starts on a
/// fresh line.
pub async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut buf = Vec::new();
    let limit = (MAX_FRAME_SIZE + 1) as u64;
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;

    if read == 0 {
        return Err(MeshError::ChannelClosed);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > MAX_FRAME_SIZE {
        discard_line(reader).await?;
        return Err(MeshError::Protocol(format!(
            "Frame too large (max {} bytes)",
            MAX_FRAME_SIZE
        )));
    }

    if buf.is_empty() {
        return Err(MeshError::Protocol("Empty frame".into()));
    }
    if buf.len() > MAX_FRAME_SIZE {
        return Err(MeshError::Protocol(format!(
            "Frame too large (max {} bytes)",
            MAX_FRAME_SIZE
        )));
    }

    String::from_utf8(buf).map_err(|e| MeshError::Protocol(format!("Invalid UTF-8: {}", e)))
}

async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<()> {
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }

        match available.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

/// Read and decode one framed message.
pub async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<FramedMessage> {
    let line = read_line(reader).await?;
    Ok(codec::decode(&line)?)
}

pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    if line.len() > MAX_FRAME_SIZE {
        return Err(MeshError::Protocol(format!(
            "Message too large: {} bytes (max {})",
            line.len(),
            MAX_FRAME_SIZE
        )));
    }

    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(())
}

/// Encode and write one framed message.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, msg: &FramedMessage) -> Result<()> {
    let line = codec::encode(msg)?;
    write_line(writer, &line).await
}
