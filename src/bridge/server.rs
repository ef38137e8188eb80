//! Socket listener and serve loop for the bridge daemon.
//!
//! The listener owns the socket file; each accepted connection is served by
//! [`serve_connection`], which answers newline-delimited JSON requests until
//! the peer hangs up. Built-in methods (ping, status, shutdown) are handled
//! here, everything else is forwarded to the [`Device`].
//!
//! ## Security
//!
//! The socket file is created with mode 0600 (owner only); that is the only
//! access control on the bridge, since anything that can open the socket may
//! drive the device. The file is removed when the listener is dropped.
//!
//! ## Usage
//!
//! ```ignore
//! use hwbridge::bridge::server::{BridgeListener, serve_connection};
//!
//! let listener = BridgeListener::bind(&config.socket_path).await?;
//! loop {
//!     let stream = listener.accept().await?;
//!     tokio::spawn(serve_connection(stream, device.clone(), path.clone(), shutdown.clone()));
//! }
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::bridge::device::Device;
use crate::bridge::protocol::{self, Request, Response};
use crate::error::Result;

/// Unix socket listener for the bridge daemon.
pub struct BridgeListener {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl BridgeListener {
    /// Bind to a Unix domain socket at the given path.
    ///
    /// This will:
    /// 1. Create the parent directory if it doesn't exist
    /// 2. Remove any existing socket file at the path
    /// 3. Bind to the socket
    /// 4. Set socket permissions to 0600 (owner only)
    ///
    /// # Errors
    ///
    /// Returns an error if any of those steps fails.
    pub async fn bind(socket_path: impl AsRef<Path>) -> Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Remove existing socket file if present (stale from previous run)
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }

        let listener = UnixListener::bind(&socket_path)?;

        // Restrict to owner only
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Accept a new incoming connection.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(stream)
    }

    /// Get the path to the socket file.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for BridgeListener {
    fn drop(&mut self) {
        // Clean up socket file on shutdown
        // Ignore errors since we're in drop
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Serve one client connection until it closes or requests shutdown.
///
/// Blank lines are skipped; lines that do not parse as a request are answered
/// with an error response (without an id, since none could be read) and the
/// connection stays open. A shutdown request is acknowledged on the wire
/// before `shutdown` is notified.
pub async fn serve_connection<D: Device>(
    stream: UnixStream,
    device: Arc<Mutex<D>>,
    socket_path: PathBuf,
    shutdown: Arc<Notify>,
) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let frame = match protocol::read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break, // client hung up
            Err(e) => {
                // Oversize or broken stream; a line protocol cannot resync
                debug!(error = %e, "dropping connection");
                break;
            }
        };

        if frame.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let request: Request = match serde_json::from_slice(&frame) {
            Ok(request) => request,
            Err(e) => {
                let response = Response::err(None, format!("invalid request: {}", e));
                protocol::write_response(&mut write_half, &response).await?;
                continue;
            }
        };

        let (response, should_shutdown) = dispatch(request, &device, &socket_path).await;
        protocol::write_response(&mut write_half, &response).await?;

        if should_shutdown {
            shutdown.notify_one();
            break;
        }
    }
    Ok(())
}

/// Dispatch a request to the built-in handlers or the device.
///
/// Returns the response and a flag indicating if the daemon should shut down.
pub async fn dispatch<D: Device>(
    request: Request,
    device: &Mutex<D>,
    socket_path: &Path,
) -> (Response, bool) {
    let id = request.id.clone();

    match request.method.as_str() {
        "ping" => {
            let response = Response::ok(id, serde_json::json!({ "pong": unix_now() }));
            (response, false)
        }

        "status" => {
            let device = device.lock().await;
            let response = Response::ok(
                id,
                serde_json::json!({
                    "connected": device.connected(),
                    "socket": socket_path.display().to_string(),
                }),
            );
            (response, false)
        }

        "shutdown" => {
            // Acknowledge first so the caller's read completes before we stop
            let response = Response::ok(id, "shutting down");
            (response, true)
        }

        _ => {
            let mut device = device.lock().await;
            match device.call(&request.method, &request.args, &request.kwargs) {
                Ok(result) => (Response::ok(id, result), false),
                Err(e) => (Response::err(id, e.to_string()), false),
            }
        }
    }
}

/// Seconds since the epoch as a float; the ping payload clients expect.
fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
