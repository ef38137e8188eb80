//! Lifecycle management for the bridge daemon.
//!
//! This module owns the start, stop, status and restart operations the CLI
//! exposes, plus the front-end handoff. Starting is idempotent: a daemon that
//! already answers the liveness probe is left alone. Stopping asks the daemon
//! to shut itself down over RPC and never waits for the process to exit.
//!
//! A daemon that spawned but does not answer within the readiness window is
//! reported as degraded rather than killed, since a slow hardware bring-up
//! looks the same as a hung one from here.

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::bridge::client::RpcClient;
use crate::bridge::pidfile;
use crate::bridge::probe::{self, RetryPolicy};
use crate::config::{self, BridgeConfig};
use crate::error::{BridgeError, Result, exit_codes};

/// How long restart waits for the old daemon to leave the socket.
const RESTART_WAIT: Duration = Duration::from_secs(5);
/// Settle delay after the old daemon stops answering.
const RESTART_SETTLE: Duration = Duration::from_millis(500);

/// What happened when a start was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A daemon was already answering on the socket; nothing was spawned.
    AlreadyRunning,
    /// A daemon was spawned and passed the readiness wait.
    Ready { pid: u32 },
    /// A daemon was spawned and is still running, but never answered within
    /// the readiness window. Callers proceed and let later RPC calls fail.
    Degraded { pid: u32 },
}

/// What happened when a stop was requested.
#[derive(Debug)]
pub enum StopOutcome {
    /// Nothing was answering on the socket.
    NotRunning,
    /// The daemon acknowledged the shutdown request.
    ShutdownSent,
    /// The daemon was alive but the shutdown request failed.
    ShutdownFailed(crate::error::ClientError),
}

/// Point-in-time daemon state for the status operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    NotRunning,
    Running {
        /// Whether the daemon reports its device as connected.
        connected: bool,
        /// Recorded pid, if the pid file holds one naming a live process.
        pid: Option<u32>,
    },
}

/// Start the bridge daemon if it is not already running.
///
/// The spawned daemon is detached; the child handle is dropped without
/// killing and the daemon is reached through the socket from here on.
///
/// # Errors
///
/// Returns `DaemonNotFound` if the daemon binary is missing and
/// `StartupFailure` if the spawned process exits before answering.
pub async fn start(config: &BridgeConfig, policy: RetryPolicy) -> Result<StartOutcome> {
    let (outcome, _child) = launch(config, policy).await?;
    Ok(outcome)
}

/// Start the bridge daemon and keep ownership of the child process.
///
/// Used in foreground mode, where the daemon should die with this process.
/// No guard is returned when a daemon was already running, since that one
/// belongs to whoever started it.
pub async fn start_foreground(
    config: &BridgeConfig,
    policy: RetryPolicy,
) -> Result<(StartOutcome, Option<DaemonGuard>)> {
    let (outcome, child) = launch(config, policy).await?;
    Ok((outcome, child.map(|child| DaemonGuard { child })))
}

async fn launch(
    config: &BridgeConfig,
    policy: RetryPolicy,
) -> Result<(StartOutcome, Option<Child>)> {
    if probe::is_alive(config).await {
        return Ok((StartOutcome::AlreadyRunning, None));
    }

    // Nothing answered, so whatever is at the socket path is stale
    remove_stale_socket(config)?;

    let mut child = spawn_daemon(config)?;
    let pid = child.id();
    pidfile::record(config, pid)?;
    info!(pid, socket = %config.socket_path.display(), "spawned bridge daemon");

    if probe::wait_ready(config, policy).await {
        info!(pid, "bridge daemon is ready");
        return Ok((StartOutcome::Ready { pid }, Some(child)));
    }

    // Not answering. A kill(pid, 0) check would count an unreaped zombie as
    // alive, so ask the child handle whether the process actually exited.
    match child.try_wait() {
        Ok(Some(status)) => {
            warn!(%status, "bridge daemon exited during startup");
            pidfile::clear(config);
            Err(BridgeError::StartupFailure {
                log: config.log_path.clone(),
            })
        }
        _ => {
            warn!(pid, "bridge daemon started but is not answering; continuing anyway");
            Ok((StartOutcome::Degraded { pid }, Some(child)))
        }
    }
}

/// Stop the bridge daemon if one is answering.
///
/// The shutdown request is fire-and-forget: the daemon acknowledges and then
/// exits on its own time, and this function does not wait for the process to
/// go away. The pid file is cleared in every case, including when the
/// shutdown request failed, so a later start begins from a clean slate.
pub async fn stop(config: &BridgeConfig) -> StopOutcome {
    if !probe::is_alive(config).await {
        pidfile::clear(config);
        return StopOutcome::NotRunning;
    }

    let client = RpcClient::new(&config.socket_path);
    let outcome = match client.shutdown().await {
        Ok(_) => {
            info!("bridge daemon acknowledged shutdown");
            StopOutcome::ShutdownSent
        }
        Err(e) => {
            warn!(error = %e, "shutdown request failed");
            StopOutcome::ShutdownFailed(e)
        }
    };
    pidfile::clear(config);
    outcome
}

/// Report whether a daemon is running and what it says about its device.
///
/// The pid is only reported when the pid file names a process that is still
/// alive; a stale pid left behind by a crash is not shown.
///
/// # Errors
///
/// Returns an `Rpc` error when a daemon answers the liveness probe but the
/// status call itself fails.
pub async fn status(config: &BridgeConfig) -> Result<StatusOutcome> {
    if !probe::is_alive(config).await {
        return Ok(StatusOutcome::NotRunning);
    }

    let client = RpcClient::new(&config.socket_path);
    let response = client.status().await?;
    let connected = response
        .result
        .as_ref()
        .and_then(|v| v.get("connected"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let pid = pidfile::read(config).filter(|&pid| pidfile::is_process_alive(pid));

    Ok(StatusOutcome::Running { connected, pid })
}

/// Stop the daemon, wait for it to leave the socket, then start a fresh one.
///
/// The wait is bounded by [`RESTART_WAIT`]; a daemon that keeps answering
/// past that is left to the subsequent start, which will simply find it
/// already running.
pub async fn restart(
    config: &BridgeConfig,
    policy: RetryPolicy,
) -> Result<(StopOutcome, StartOutcome)> {
    let stopped = stop(config).await;

    if !matches!(stopped, StopOutcome::NotRunning) {
        let deadline = Instant::now() + RESTART_WAIT;
        while probe::is_alive(config).await && Instant::now() < deadline {
            sleep(Duration::from_millis(200)).await;
        }
        sleep(RESTART_SETTLE).await;
    }

    let started = start(config, policy).await?;
    Ok((stopped, started))
}

/// Spawn the daemon process in the background.
///
/// The daemon is handed its socket, pid file and log paths explicitly so the
/// pair always agrees on them even when they came from environment overrides.
/// stdin/stdout/stderr are redirected to null; the daemon sets up its own
/// logging.
fn spawn_daemon(config: &BridgeConfig) -> Result<Child> {
    if !config.daemon_path.exists() {
        return Err(BridgeError::DaemonNotFound(config.daemon_path.clone()));
    }

    // Runtime directory for socket/pid/log files
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let child = Command::new(&config.daemon_path)
        .arg("--socket")
        .arg(&config.socket_path)
        .arg("--pid-file")
        .arg(&config.pid_path)
        .arg("--log")
        .arg(&config.log_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    Ok(child)
}

fn remove_stale_socket(config: &BridgeConfig) -> Result<()> {
    match std::fs::remove_file(&config.socket_path) {
        Ok(()) => {
            debug!(path = %config.socket_path.display(), "removed stale socket");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Owns a daemon child process for foreground sessions.
///
/// Dropping the guard kills the daemon outright; [`DaemonGuard::shutdown`]
/// is the graceful path.
pub struct DaemonGuard {
    child: Child,
}

impl DaemonGuard {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Stop the daemon: SIGTERM, a bounded wait for it to exit, then SIGKILL.
    ///
    /// SIGTERM is the graceful path here; the daemon cleans up its socket and
    /// pid file on the way out.
    pub async fn shutdown(mut self) {
        let pid = self.child.id();

        // SAFETY: signaling a child we spawned and have not reaped
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }

        for _ in 0..50 {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(pid, %status, "bridge daemon exited");
                    return;
                }
                Ok(None) => sleep(Duration::from_millis(100)).await,
                Err(_) => break,
            }
        }

        warn!(pid, "bridge daemon ignored SIGTERM, killing it");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        // Last resort if shutdown() was never called; kill() on a child that
        // already exited is a harmless error
        // Ignore errors since we're in drop
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Replace the current process with the front-end command.
///
/// `HWBRIDGE_SOCKET` is exported so the front-end finds the same daemon.
/// On success this never returns.
pub fn exec_frontend(config: &BridgeConfig, argv: &[String]) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let (program, rest) = argv
        .split_first()
        .ok_or_else(|| BridgeError::Usage("front-end command is empty".to_string()))?;

    let err = Command::new(program)
        .args(rest)
        .env(config::ENV_SOCKET, &config.socket_path)
        .exec();

    // exec only returns on failure
    Err(err.into())
}

/// Run the front-end as a child process and return its exit code.
///
/// Used in foreground mode, where this process must stay alive to own the
/// daemon child. A front-end killed by a signal maps to the generic failure
/// code.
pub async fn run_frontend(config: &BridgeConfig, argv: &[String]) -> Result<i32> {
    let (program, rest) = argv
        .split_first()
        .ok_or_else(|| BridgeError::Usage("front-end command is empty".to_string()))?;

    let status = tokio::process::Command::new(program)
        .args(rest)
        .env(config::ENV_SOCKET, &config.socket_path)
        .status()
        .await?;

    Ok(status.code().unwrap_or(exit_codes::FAILURE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    fn test_config(dir: &TempDir) -> BridgeConfig {
        BridgeConfig {
            socket_path: dir.path().join("bridge.sock"),
            log_path: dir.path().join("bridge.log"),
            pid_path: dir.path().join("bridge.pid"),
            daemon_path: dir.path().join("hwbridged"),
            frontend: None,
        }
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(50),
        }
    }

    /// Answer every connection with the same canned reply.
    async fn answer_all(listener: UnixListener, reply: &'static [u8]) {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let mut buf = vec![0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let _ = stream.write_all(reply).await;
        }
    }

    /// Write an executable script to stand in for the daemon binary.
    fn fake_daemon(dir: &TempDir, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("hwbridged");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_start_missing_binary_is_daemon_not_found() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let err = start(&config, quick_policy()).await.unwrap_err();
        assert!(matches!(err, BridgeError::DaemonNotFound(_)));
    }

    #[tokio::test]
    async fn test_start_skips_spawn_when_daemon_answers() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let listener = UnixListener::bind(&config.socket_path).unwrap();
        let server = tokio::spawn(answer_all(
            listener,
            b"{\"ok\":true,\"result\":{\"pong\":1.0}}\n",
        ));

        // The daemon binary does not exist; an early return is the proof
        // that nothing tried to spawn it
        let outcome = start(&config, quick_policy()).await.unwrap();
        assert_eq!(outcome, StartOutcome::AlreadyRunning);
        server.abort();
    }

    #[tokio::test]
    async fn test_start_reports_failure_when_daemon_exits() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.daemon_path = fake_daemon(&dir, "exit 3");

        let err = start(&config, quick_policy()).await.unwrap_err();
        assert!(matches!(err, BridgeError::StartupFailure { .. }));
        // A failed start leaves no pid file behind
        assert!(!config.pid_path.exists());
    }

    #[tokio::test]
    async fn test_start_degrades_when_daemon_lives_but_never_answers() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.daemon_path = fake_daemon(&dir, "sleep 2");

        let outcome = start(&config, quick_policy()).await.unwrap();
        match outcome {
            StartOutcome::Degraded { pid } => {
                assert_eq!(pidfile::read(&config), Some(pid));
            }
            other => panic!("expected Degraded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_start_removes_stale_socket_file() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.daemon_path = fake_daemon(&dir, "sleep 2");

        // A plain file where the socket should be, from a dead daemon
        std::fs::write(&config.socket_path, b"stale").unwrap();

        let _ = start(&config, quick_policy()).await.unwrap();
        assert!(!config.socket_path.exists());
    }

    #[tokio::test]
    async fn test_stop_when_nothing_runs_clears_pid_file() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        pidfile::record(&config, 12345).unwrap();

        let outcome = stop(&config).await;
        assert!(matches!(outcome, StopOutcome::NotRunning));
        assert!(!config.pid_path.exists());
    }

    #[tokio::test]
    async fn test_stop_sends_shutdown_and_clears_pid_file() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        pidfile::record(&config, 12345).unwrap();
        let listener = UnixListener::bind(&config.socket_path).unwrap();
        let server = tokio::spawn(answer_all(
            listener,
            b"{\"ok\":true,\"result\":\"shutting down\"}\n",
        ));

        let outcome = stop(&config).await;
        assert!(matches!(outcome, StopOutcome::ShutdownSent));
        assert!(!config.pid_path.exists());
        server.abort();
    }

    #[tokio::test]
    async fn test_stop_reports_failed_shutdown_but_still_clears() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        pidfile::record(&config, 12345).unwrap();
        // Answers everything with an application error: alive by the probe's
        // rules, but the shutdown call comes back failed
        let listener = UnixListener::bind(&config.socket_path).unwrap();
        let server = tokio::spawn(answer_all(
            listener,
            b"{\"ok\":false,\"error\":\"device busy\"}\n",
        ));

        let outcome = stop(&config).await;
        assert!(matches!(outcome, StopOutcome::ShutdownFailed(_)));
        assert!(!config.pid_path.exists());
        server.abort();
    }

    #[tokio::test]
    async fn test_status_not_running() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let outcome = status(&config).await.unwrap();
        assert_eq!(outcome, StatusOutcome::NotRunning);
    }

    #[tokio::test]
    async fn test_status_running_reports_connection_and_pid() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let own_pid = std::process::id();
        pidfile::record(&config, own_pid).unwrap();
        let listener = UnixListener::bind(&config.socket_path).unwrap();
        let server = tokio::spawn(answer_all(
            listener,
            b"{\"ok\":true,\"result\":{\"connected\":true,\"socket\":\"/tmp/b.sock\"}}\n",
        ));

        let outcome = status(&config).await.unwrap();
        assert_eq!(
            outcome,
            StatusOutcome::Running {
                connected: true,
                pid: Some(own_pid),
            }
        );
        server.abort();
    }

    #[tokio::test]
    async fn test_status_hides_pid_of_dead_process() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        pidfile::record(&config, u32::MAX).unwrap();
        let listener = UnixListener::bind(&config.socket_path).unwrap();
        let server = tokio::spawn(answer_all(
            listener,
            b"{\"ok\":true,\"result\":{\"connected\":false,\"socket\":\"/tmp/b.sock\"}}\n",
        ));

        let outcome = status(&config).await.unwrap();
        assert_eq!(
            outcome,
            StatusOutcome::Running {
                connected: false,
                pid: None,
            }
        );
        server.abort();
    }

    #[tokio::test]
    async fn test_restart_from_cold_is_a_plain_start() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.daemon_path = fake_daemon(&dir, "sleep 2");

        let (stopped, started) = restart(&config, quick_policy()).await.unwrap();
        assert!(matches!(stopped, StopOutcome::NotRunning));
        assert!(matches!(started, StartOutcome::Degraded { .. }));
    }

    #[tokio::test]
    async fn test_start_foreground_guard_stops_the_child() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.daemon_path = fake_daemon(&dir, "exec sleep 5");

        let (outcome, guard) = start_foreground(&config, quick_policy()).await.unwrap();
        assert!(matches!(outcome, StartOutcome::Degraded { .. }));
        let guard = guard.expect("a spawned daemon comes with a guard");
        let pid = guard.pid();
        assert!(pidfile::is_process_alive(pid));

        guard.shutdown().await;
        assert!(!pidfile::is_process_alive(pid));
    }

    #[tokio::test]
    async fn test_exec_frontend_rejects_empty_command() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let err = exec_frontend(&config, &[]).unwrap_err();
        assert!(matches!(err, BridgeError::Usage(_)));
    }

    #[tokio::test]
    async fn test_run_frontend_returns_exit_code() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let argv = vec!["/bin/sh".to_string(), "-c".to_string(), "exit 7".to_string()];
        assert_eq!(run_frontend(&config, &argv).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_run_frontend_exports_socket_path() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let argv = vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            "test -n \"$HWBRIDGE_SOCKET\"".to_string(),
        ];
        assert_eq!(run_frontend(&config, &argv).await.unwrap(), 0);
    }
}
