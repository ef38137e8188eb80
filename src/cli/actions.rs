//! Action handlers for the hwbridge CLI.
//!
//! Each handler drives the supervisor, prints a human-readable summary and
//! returns the process exit code. Degraded outcomes are reported as warnings
//! but still exit zero; the front-end or a later call surfaces the real
//! failure if there is one.

use crate::bridge::probe::RetryPolicy;
use crate::bridge::supervisor::{self, StartOutcome, StatusOutcome, StopOutcome};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result, exit_codes};

/// Handle `--start`.
pub async fn start(config: &BridgeConfig) -> Result<i32> {
    match supervisor::start(config, RetryPolicy::default()).await? {
        StartOutcome::AlreadyRunning => {
            println!("Bridge daemon is already running.");
        }
        StartOutcome::Ready { pid } => {
            println!("Bridge daemon started.");
            println!("  PID: {}", pid);
        }
        StartOutcome::Degraded { pid } => {
            println!(
                "Warning: Bridge daemon started (PID {}) but is not answering yet.",
                pid
            );
        }
    }
    Ok(exit_codes::SUCCESS)
}

/// Handle `--stop`.
///
/// A shutdown request the daemon refused still exits zero; the daemon was
/// told to go and the pid file is already cleared.
pub async fn stop(config: &BridgeConfig) -> Result<i32> {
    match supervisor::stop(config).await {
        StopOutcome::NotRunning => {
            println!("Bridge daemon is not running.");
        }
        StopOutcome::ShutdownSent => {
            println!("Shutdown request sent to bridge daemon.");
        }
        StopOutcome::ShutdownFailed(e) => {
            println!(
                "Warning: Bridge daemon did not accept the shutdown request: {}",
                e
            );
        }
    }
    Ok(exit_codes::SUCCESS)
}

/// Handle `--status`. Exits nonzero when nothing is running, so scripts can
/// branch on the result without parsing output.
pub async fn status(config: &BridgeConfig) -> Result<i32> {
    match supervisor::status(config).await? {
        StatusOutcome::Running { connected, pid } => {
            println!("Bridge daemon status: running");
            if let Some(pid) = pid {
                println!("  PID: {}", pid);
            }
            println!("  Socket: {}", config.socket_path.display());
            println!(
                "  Device connected: {}",
                if connected { "yes" } else { "no" }
            );
            Ok(exit_codes::SUCCESS)
        }
        StatusOutcome::NotRunning => {
            println!("Bridge daemon status: not running");
            println!("  Run 'hwbridge --start' to start it.");
            Ok(exit_codes::FAILURE)
        }
    }
}

/// Handle `--restart`.
pub async fn restart(config: &BridgeConfig) -> Result<i32> {
    let (stopped, started) = supervisor::restart(config, RetryPolicy::default()).await?;

    if matches!(stopped, StopOutcome::NotRunning) {
        println!("Bridge daemon was not running.");
    }
    match started {
        StartOutcome::Ready { pid } => {
            println!("Bridge daemon restarted.");
            println!("  PID: {}", pid);
        }
        StartOutcome::Degraded { pid } => {
            println!(
                "Warning: Bridge daemon restarted (PID {}) but is not answering yet.",
                pid
            );
        }
        StartOutcome::AlreadyRunning => {
            println!("Warning: The old bridge daemon is still answering; nothing was replaced.");
        }
    }
    Ok(exit_codes::SUCCESS)
}

/// Handle the default action: make sure a daemon is up, then hand off to the
/// front-end.
///
/// In the default mode the daemon is left running detached and this process
/// is replaced by the front-end via exec. With `--foreground` the daemon is
/// kept as a child, the front-end runs as a second child, and the daemon is
/// stopped once the front-end exits.
pub async fn run(config: &BridgeConfig, foreground: bool, frontend_args: &[String]) -> Result<i32> {
    let argv = resolve_frontend(config, frontend_args)?;

    if foreground {
        let (outcome, guard) = supervisor::start_foreground(config, RetryPolicy::default()).await?;
        warn_if_degraded(&outcome);

        let code = supervisor::run_frontend(config, &argv).await?;

        if let Some(guard) = guard {
            guard.shutdown().await;
        }
        Ok(code)
    } else {
        let outcome = supervisor::start(config, RetryPolicy::default()).await?;
        warn_if_degraded(&outcome);

        supervisor::exec_frontend(config, &argv)?;
        // exec does not return on success
        Ok(exit_codes::SUCCESS)
    }
}

/// Build the front-end command line: the configured command with any
/// passthrough arguments appended.
fn resolve_frontend(config: &BridgeConfig, frontend_args: &[String]) -> Result<Vec<String>> {
    let mut argv = config.frontend.clone().ok_or_else(|| {
        BridgeError::Usage("no front-end command configured; set HWBRIDGE_FRONTEND".to_string())
    })?;
    argv.extend_from_slice(frontend_args);
    Ok(argv)
}

/// The front-end owns stdout from here on, so warnings go to stderr.
fn warn_if_degraded(outcome: &StartOutcome) {
    if let StartOutcome::Degraded { pid } = outcome {
        eprintln!(
            "Warning: Bridge daemon (PID {}) is not answering yet; the front-end may fail to connect.",
            pid
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> BridgeConfig {
        BridgeConfig {
            socket_path: dir.path().join("bridge.sock"),
            log_path: dir.path().join("bridge.log"),
            pid_path: dir.path().join("bridge.pid"),
            daemon_path: dir.path().join("hwbridged"),
            frontend: None,
        }
    }

    #[test]
    fn test_resolve_frontend_appends_passthrough_args() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.frontend = Some(vec!["python3".to_string(), "demo.py".to_string()]);

        let argv =
            resolve_frontend(&config, &["--fullscreen".to_string(), "-v".to_string()]).unwrap();
        assert_eq!(argv, vec!["python3", "demo.py", "--fullscreen", "-v"]);
    }

    #[test]
    fn test_resolve_frontend_without_passthrough_args() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.frontend = Some(vec!["default-ui".to_string()]);

        assert_eq!(
            resolve_frontend(&config, &[]).unwrap(),
            vec!["default-ui".to_string()]
        );
    }

    #[test]
    fn test_resolve_frontend_unconfigured_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        // Passthrough args alone are not a command; the front-end itself
        // comes from the configuration
        let err = resolve_frontend(&config, &["--fullscreen".to_string()]).unwrap_err();
        assert!(matches!(err, BridgeError::Usage(_)));
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }
}
