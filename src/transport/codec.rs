//! Content-Length framed JSON messages.
//!
//! Each frame is `Content-Length: N\r\n\r\n` followed by N bytes of UTF-8 JSON.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FrameError;

/// Upper bound on a single frame unless configured otherwise
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const CONTENT_LENGTH: &str = "Content-Length: ";

/// Longest header or separator line accepted, newline included
pub const MAX_HEADER_LEN: usize = 1024;

/// Encode one message as a complete frame.
pub fn encode_frame<M: Serialize>(message: &M) -> Result<Vec<u8>, FrameError> {
    let json = serde_json::to_vec(message)?;
    let mut frame = format!("{}{}\r\n\r\n", CONTENT_LENGTH, json.len()).into_bytes();
    frame.extend_from_slice(&json);
    Ok(frame)
}

/// Write one frame and flush it.
pub async fn write_frame<W, M>(writer: &mut W, message: &M) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin + ?Sized,
    M: Serialize,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. Returns `Ok(None)` on a clean end of stream between frames.
pub async fn read_frame<R, M>(reader: &mut R, max_len: usize) -> Result<Option<M>, FrameError>
where
    R: AsyncBufRead + Unpin + ?Sized,
    M: DeserializeOwned,
{
    let mut line = String::new();

    // Skip blank separator lines
    let header = loop {
        line.clear();
        let bytes_read = read_header_line(reader, &mut line).await?;
        if bytes_read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            break trimmed.to_string();
        }
    };

    let length_str = header
        .strip_prefix(CONTENT_LENGTH)
        .ok_or_else(|| FrameError::MissingContentLength(header.clone()))?;
    let len = length_str
        .trim()
        .parse::<usize>()
        .map_err(|_| FrameError::InvalidContentLength(length_str.to_string()))?;
    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }

    // Blank line between header and body
    line.clear();
    read_header_line(reader, &mut line).await?;
    if !line.trim().is_empty() {
        return Err(FrameError::MissingContentLength(line.trim().to_string()));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(serde_json::from_slice(&body)?))
}

/// Read one line of at most [`MAX_HEADER_LEN`] bytes.
async fn read_header_line<R>(reader: &mut R, line: &mut String) -> Result<usize, FrameError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let bytes_read = (&mut *reader)
        .take(MAX_HEADER_LEN as u64)
        .read_line(line)
        .await?;
    if bytes_read == MAX_HEADER_LEN && !line.ends_with('\n') {
        return Err(FrameError::HeaderTooLong {
            max: MAX_HEADER_LEN,
        });
    }
    Ok(bytes_read)
}
