//! RPC client for talking to the bridge daemon.
//!
//! The client holds only the socket path and dials a fresh connection for
//! every call, so it carries no connection state between the short-lived CLI
//! commands. Each call runs under its own deadline, and failures are
//! classified so callers can tell a missing daemon apart from a daemon that
//! answered with an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::bridge::protocol::{self, Request, Response};
use crate::error::ClientError;

/// Deadline for the lightweight liveness ping.
pub const PING_TIMEOUT: Duration = Duration::from_secs(3);
/// Deadline for the shutdown request; the daemon acknowledges before it stops.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// Deadline for ordinary method calls.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for calling methods on the bridge daemon.
///
/// # Example
///
/// ```ignore
/// use hwbridge::bridge::client::RpcClient;
///
/// let client = RpcClient::new(&config.socket_path);
/// let response = client.ping().await?;
/// println!("Bridge answered: {:?}", response.result);
/// ```
pub struct RpcClient {
    socket_path: PathBuf,
}

impl RpcClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Invoke a method on the daemon and wait for its response.
    ///
    /// Failure classification:
    /// - connect failure or deadline exceeded: `Unreachable`
    /// - stream closed before any bytes arrived: `NoResponse`
    /// - bytes that do not decode as a response: `Malformed`
    /// - well-formed `ok: false`: `Application` with the daemon's message
    ///
    /// A response that arrives with `ok: true` is returned whole so callers
    /// can pick fields out of `result`.
    pub async fn call(
        &self,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        deadline: Duration,
    ) -> Result<Response, ClientError> {
        match timeout(deadline, self.exchange(method, args, kwargs)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Unreachable(format!(
                "no reply from {} within {:?}",
                self.socket_path.display(),
                deadline
            ))),
        }
    }

    async fn exchange(
        &self,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            ClientError::Unreachable(format!("{}: {}", self.socket_path.display(), e))
        })?;
        let (read_half, mut write_half) = stream.into_split();

        let request = Request::new(method, args, kwargs);
        protocol::write_request(&mut write_half, &request)
            .await
            .map_err(|e| ClientError::Unreachable(format!("send failed: {}", e)))?;

        let mut reader = BufReader::new(read_half);
        let response = match protocol::read_response(&mut reader).await {
            Ok(Some(response)) => response,
            Ok(None) => return Err(ClientError::NoResponse),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(ClientError::Malformed(e.to_string()));
            }
            Err(e) => return Err(ClientError::Unreachable(format!("read failed: {}", e))),
        };

        if response.ok {
            Ok(response)
        } else {
            Err(ClientError::Application(
                response
                    .error
                    .unwrap_or_else(|| "RPC call failed".to_string()),
            ))
        }
    }

    /// Liveness ping. The payload carries the daemon's clock but callers
    /// should only rely on getting an answer at all.
    pub async fn ping(&self) -> Result<Response, ClientError> {
        self.call("ping", Vec::new(), Map::new(), PING_TIMEOUT).await
    }

    /// Fetch the daemon's status summary (device connection state, socket).
    pub async fn status(&self) -> Result<Response, ClientError> {
        self.call("status", Vec::new(), Map::new(), CALL_TIMEOUT)
            .await
    }

    /// Request a graceful daemon shutdown. The daemon acknowledges first and
    /// stops after the response is on the wire.
    pub async fn shutdown(&self) -> Result<Response, ClientError> {
        self.call("shutdown", Vec::new(), Map::new(), SHUTDOWN_TIMEOUT)
            .await
    }
}
