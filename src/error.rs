use std::path::PathBuf;

use thiserror::Error;

/// Process exit codes for the lifecycle commands
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const USER_ERROR: i32 = 2;
}

/// Failures from a single RPC exchange with the bridge daemon.
///
/// Transport-level failures (the first three variants) mean nothing answered
/// on the other side of the socket; `Application` means the daemon is up and
/// reported an error of its own. Liveness checks rely on that distinction.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Connect failed or the call missed its deadline.
    #[error("bridge daemon unreachable: {0}")]
    Unreachable(String),

    /// The daemon accepted the connection but closed it without replying.
    #[error("no response from bridge daemon")]
    NoResponse,

    #[error("malformed response from bridge daemon: {0}")]
    Malformed(String),

    /// The daemon answered with ok=false; the message is passed through.
    #[error("{0}")]
    Application(String),
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid usage: {0}")]
    Usage(String),

    #[error("Bridge daemon binary not found at {}", .0.display())]
    DaemonNotFound(PathBuf),

    #[error("Bridge daemon failed to start. Check logs at: {}", log.display())]
    StartupFailure { log: PathBuf },

    #[error("RPC call failed: {0}")]
    Rpc(#[from] ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors (bad arguments, missing configuration)
            BridgeError::Usage(_) => exit_codes::USER_ERROR,

            // Operational failures
            BridgeError::Config(_)
            | BridgeError::DaemonNotFound(_)
            | BridgeError::StartupFailure { .. }
            | BridgeError::Rpc(_)
            | BridgeError::Io(_) => exit_codes::FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
