//! Bridge endpoint configuration.
//!
//! Resolves the socket, log, pid file, and daemon binary paths plus the
//! optional front-end command. Paths default under `~/.hwbridge/` and can be
//! overridden per path through `HWBRIDGE_*` environment variables. Resolution
//! happens once per invocation; components receive the resolved value instead
//! of reading the environment themselves.

use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};

/// Environment variable naming the daemon socket path.
pub const ENV_SOCKET: &str = "HWBRIDGE_SOCKET";
/// Environment variable naming the daemon log file.
pub const ENV_LOG: &str = "HWBRIDGE_LOG";
/// Environment variable naming the daemon pid file.
pub const ENV_PID_FILE: &str = "HWBRIDGE_PID_FILE";
/// Environment variable naming the daemon binary to spawn.
pub const ENV_DAEMON: &str = "HWBRIDGE_DAEMON";
/// Environment variable holding the front-end command line.
pub const ENV_FRONTEND: &str = "HWBRIDGE_FRONTEND";

/// Resolved paths and front-end command for one CLI invocation.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Unix socket the daemon listens on.
    pub socket_path: PathBuf,
    /// Daemon log file, surfaced in startup failure messages.
    pub log_path: PathBuf,
    /// Advisory pid file.
    pub pid_path: PathBuf,
    /// Daemon binary to spawn.
    pub daemon_path: PathBuf,
    /// Front-end command for the run action, split on whitespace.
    pub frontend: Option<Vec<String>>,
}

impl BridgeConfig {
    /// Resolve the configuration from the process environment.
    pub fn resolve() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| BridgeError::Config("Could not determine home directory".into()))?;
        Self::resolve_from(&home, |key| std::env::var(key).ok())
    }

    /// Resolve against an explicit home directory and environment lookup.
    ///
    /// Blank or whitespace-only overrides fall back to the default, so an
    /// exported-but-empty variable does not produce an unusable path.
    pub fn resolve_from(home: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base = home.join(".hwbridge");
        let lookup = |key: &str| {
            env(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let socket_path = lookup(ENV_SOCKET)
            .map(PathBuf::from)
            .unwrap_or_else(|| base.join("hwbridged.sock"));
        let log_path = lookup(ENV_LOG)
            .map(PathBuf::from)
            .unwrap_or_else(|| base.join("hwbridged.log"));
        let pid_path = lookup(ENV_PID_FILE)
            .map(PathBuf::from)
            .unwrap_or_else(|| base.join("hwbridged.pid"));

        let daemon_path = match lookup(ENV_DAEMON) {
            Some(path) => PathBuf::from(path),
            None => default_daemon_path()?,
        };

        let frontend = lookup(ENV_FRONTEND).map(|raw| {
            raw.split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        Ok(BridgeConfig {
            socket_path,
            log_path,
            pid_path,
            daemon_path,
            frontend,
        })
    }
}

/// Default to an `hwbridged` binary installed next to the CLI.
fn default_daemon_path() -> Result<PathBuf> {
    let current = std::env::current_exe()?;
    Ok(current.with_file_name("hwbridged"))
}
