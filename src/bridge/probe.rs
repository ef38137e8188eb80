//! Liveness and readiness probing for the bridge daemon.
//!
//! Liveness asks "is something answering on the socket right now". Readiness
//! waits for a freshly spawned daemon to reach that state within a bounded
//! retry schedule, since privileged hardware setup can take several seconds.

use std::path::Path;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::bridge::client::RpcClient;
use crate::config::BridgeConfig;
use crate::error::ClientError;

/// Bounded retry schedule for the readiness wait.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// How many liveness checks to attempt before giving up.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// Twenty one-second attempts, sized for device enumeration and bus
    /// resets on slow boards.
    fn default() -> Self {
        Self {
            max_attempts: 20,
            delay: Duration::from_secs(1),
        }
    }
}

/// Check whether the socket path exists and is actually a Unix socket.
///
/// A stale regular file or directory at the socket path can never be
/// connected to, so it fails the check without touching the socket.
pub fn socket_exists(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.file_type().is_socket(),
        Err(_) => false,
    }
}

/// Check whether a daemon is answering on the configured socket.
///
/// The daemon counts as alive when it produces any well-formed response to
/// ping, including an application-level error: a daemon that answers with
/// ok=false is running, just unhappy. Transport failures (missing socket,
/// refused connect, silence, garbage) all mean not alive. Never errors.
pub async fn is_alive(config: &BridgeConfig) -> bool {
    if !socket_exists(&config.socket_path) {
        return false;
    }

    let client = RpcClient::new(&config.socket_path);
    matches!(client.ping().await, Ok(_) | Err(ClientError::Application(_)))
}

/// Wait for the daemon to start answering, bounded by the retry policy.
///
/// Returns true as soon as a liveness check passes, false once every attempt
/// is used up. No sleep after the final failed attempt; with zero attempts
/// nothing is probed at all.
pub async fn wait_ready(config: &BridgeConfig, policy: RetryPolicy) -> bool {
    for attempt in 1..=policy.max_attempts {
        if is_alive(config).await {
            debug!(attempt, "bridge daemon is ready");
            return true;
        }
        debug!(
            attempt,
            max_attempts = policy.max_attempts,
            "bridge daemon not answering yet"
        );
        if attempt < policy.max_attempts {
            sleep(policy.delay).await;
        }
    }
    false
}
