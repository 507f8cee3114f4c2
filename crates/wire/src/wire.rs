// SPDX-License-Identifier: MIT

//! Frame codec: a little-endian 4-byte length prefix followed by exactly
//! that many bytes of UTF-8 JSON. Generic over any `AsyncRead`/`AsyncWrite`
//! pair so the same codec drives a Unix socket in production and an
//! in-memory `tokio::io::duplex` pair in tests.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout as tokio_timeout;

pub const MAX_FRAME_BYTES: usize = 8192;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("peer closed the connection")]
    EndOfStream,

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads one length-prefixed JSON message and decodes it into `T`, matching
/// field names case-insensitively the way the rest of the wire contract
/// requires.
pub async fn read_message<R, T>(stream: &mut R, timeout: Duration) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match tokio_timeout(timeout, stream.read_exact(&mut len_buf)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::EndOfStream)
        }
        Ok(Err(e)) => return Err(ProtocolError::Io(e)),
        Err(_) => return Err(ProtocolError::Timeout("length prefix")),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len == 0 || len > MAX_FRAME_BYTES {
        return Err(ProtocolError::Malformed(format!(
            "frame length {len} out of range 1..={MAX_FRAME_BYTES}"
        )));
    }

    let mut body = vec![0u8; len];
    match tokio_timeout(timeout, stream.read_exact(&mut body)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::EndOfStream)
        }
        Ok(Err(e)) => return Err(ProtocolError::Io(e)),
        Err(_) => return Err(ProtocolError::Timeout("message body")),
    }

    let value: serde_json::Value = serde_json::from_slice(&body)?;
    let value = lowercase_object_keys(value);
    Ok(serde_json::from_value(value)?)
}

/// Encodes `value` as JSON and writes it as one length-prefixed frame.
pub async fn write_message<W, T>(stream: &mut W, value: &T, timeout: Duration) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(value)?;
    if body.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::Malformed(format!(
            "encoded message is {} bytes, exceeds {MAX_FRAME_BYTES}",
            body.len()
        )));
    }
    let len = body.len() as u32;

    let write_all = async {
        stream.write_all(&len.to_le_bytes()).await?;
        stream.write_all(&body).await?;
        stream.flush().await
    };
    match tokio_timeout(timeout, write_all).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ProtocolError::Io(e)),
        Err(_) => Err(ProtocolError::Timeout("message write")),
    }
}

/// Recursively lowercases object keys so `from_value` matches fields
/// case-insensitively (serde_json has no built-in case-insensitive mode).
fn lowercase_object_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.to_ascii_lowercase(), lowercase_object_keys(v));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(lowercase_object_keys).collect())
        }
        other => other,
    }
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
