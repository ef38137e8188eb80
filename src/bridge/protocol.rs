//! RPC protocol types and framing for bridge daemon communication.
//!
//! This module defines the Request/Response envelopes and the newline-delimited
//! JSON protocol spoken over the daemon's Unix domain socket.
//!
//! ## Protocol Format
//!
//! Each message is one compact JSON object terminated by `\n`:
//! - Request: `{"id": "<uuid>", "method": "...", "args": [...], "kwargs": {...}}`
//! - Response: `{"id": "<uuid>", "ok": true, "result": ...}` or
//!   `{"id": "<uuid>", "ok": false, "error": "..."}`
//!
//! The daemon answers frames until the peer hangs up; the client in this
//! crate exchanges one pair per connection. Line framing keeps the daemon
//! reachable from anything that can write JSON lines to a socket, not just
//! this crate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

/// Maximum frame size (1 MB) to prevent memory exhaustion from a bad peer
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// RPC request envelope sent from client to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Unique request identifier for correlating responses
    pub id: String,
    /// The method to invoke
    pub method: String,
    /// Positional arguments
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl Request {
    /// Create a new request with a fresh uuid identifier
    pub fn new(method: impl Into<String>, args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method: method.into(),
            args,
            kwargs,
        }
    }
}

/// RPC response envelope sent from daemon to client.
///
/// The id echoes the request when the daemon managed to parse one; parse
/// failures are answered without it. Unknown fields are ignored so the
/// daemon can grow its responses without breaking older clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Request ID this response corresponds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Whether the call succeeded
    pub ok: bool,
    /// Method result if ok is true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message if ok is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Create a successful response with a result
    pub fn ok(id: impl Into<Option<String>>, result: impl Serialize) -> Self {
        Self {
            id: id.into(),
            ok: true,
            result: Some(serde_json::to_value(result).unwrap_or(Value::Null)),
            error: None,
        }
    }

    /// Create an error response
    pub fn err(id: impl Into<Option<String>>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Write a newline-terminated frame to an async writer.
///
/// # Errors
///
/// Returns an error if the data exceeds MAX_FRAME_BYTES or if writing fails.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    if data.len() > MAX_FRAME_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "frame too large: {} bytes (max {})",
                data.len(),
                MAX_FRAME_BYTES
            ),
        ));
    }

    writer.write_all(data).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Read one newline-terminated frame from an async reader.
///
/// Returns `Ok(None)` on clean end of stream with nothing read. A frame that
/// hits end of stream before its newline is returned as-is; whether it is
/// usable is the caller's parse to make. The terminator (and a preceding
/// `\r`, for hand-typed clients) is stripped.
///
/// # Errors
///
/// Returns `InvalidData` if the line exceeds MAX_FRAME_BYTES before a
/// newline shows up; the stream cannot be resynchronized after that.
pub async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    let mut limited = (&mut *reader).take(MAX_FRAME_BYTES as u64 + 1);
    let n = limited.read_until(b'\n', &mut buf).await?;

    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    if buf.len() > MAX_FRAME_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large (max {} bytes)", MAX_FRAME_BYTES),
        ));
    }
    Ok(Some(buf))
}

/// Serialize and write a request to an async writer.
pub async fn write_request<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    request: &Request,
) -> io::Result<()> {
    let json =
        serde_json::to_vec(request).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    write_frame(writer, &json).await
}

/// Serialize and write a response to an async writer.
pub async fn write_response<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
) -> io::Result<()> {
    let json =
        serde_json::to_vec(response).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    write_frame(writer, &json).await
}

/// Read and deserialize a response from an async reader.
///
/// Returns `Ok(None)` when the stream closed before any bytes arrived.
/// Undecodable bytes come back as `InvalidData`.
pub async fn read_response<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<Response>> {
    let Some(data) = read_frame(reader).await? else {
        return Ok(None);
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
