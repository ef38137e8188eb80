//! hwbridged - the hardware bridge daemon.
//!
//! The hwbridged binary is a long-running privileged process that:
//! - Accepts RPC connections from the CLI over a Unix domain socket
//! - Drives the hardware device behind a serialized handle
//! - Handles graceful shutdown on SIGTERM/SIGINT and the shutdown RPC
//!
//! ## Usage
//!
//! The daemon is typically spawned by `hwbridge` with explicit paths.
//! Manual start: `hwbridged`
//!
//! ## Files
//!
//! - `~/.hwbridge/hwbridged.sock` - Unix socket for RPC
//! - `~/.hwbridge/hwbridged.pid` - PID file for process tracking
//! - `~/.hwbridge/hwbridged.log` - daemon log file

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{Mutex, Notify};
use tracing_appender::non_blocking::WorkerGuard;

use hwbridge::bridge::device::{Device, NullDevice};
use hwbridge::bridge::pidfile;
use hwbridge::bridge::server::{self, BridgeListener};
use hwbridge::config::BridgeConfig;

/// hwbridged - hardware bridge daemon
#[derive(Parser)]
#[command(name = "hwbridged")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Unix socket to listen on
    #[arg(long)]
    socket: Option<PathBuf>,

    /// PID file path
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Log file path
    #[arg(long)]
    log: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "hwbridge=trace"
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = BridgeConfig::resolve()?;
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }
    if let Some(pid_file) = args.pid_file {
        config.pid_path = pid_file;
    }
    if let Some(log) = args.log {
        config.log_path = log;
    }

    // Initialize logging to the daemon log file
    let _guard = init_logging(&config.log_path, &args.log_level)?;

    tracing::info!("hwbridged starting, version {}", env!("CARGO_PKG_VERSION"));

    // Write PID file; the supervisor records its own copy, but a manual
    // start must leave one too
    pidfile::record(&config, std::process::id())?;

    // Bind the RPC socket
    let listener = BridgeListener::bind(&config.socket_path).await?;
    tracing::info!("hwbridged listening on {:?}", listener.socket_path());

    // The hardware session is single-user, so every call goes through one lock
    let device = Arc::new(Mutex::new(NullDevice::new()));

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    // Woken by the shutdown RPC after its response is on the wire
    let shutdown = Arc::new(Notify::new());

    loop {
        select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, shutting down...");
                break;
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, shutting down...");
                break;
            }
            _ = shutdown.notified() => {
                tracing::info!("Shutdown requested via RPC");
                break;
            }

            // Accept new connections
            result = listener.accept() => {
                match result {
                    Ok(stream) => {
                        let device = Arc::clone(&device);
                        let socket_path = config.socket_path.clone();
                        let shutdown = Arc::clone(&shutdown);
                        tokio::spawn(async move {
                            if let Err(e) =
                                server::serve_connection(stream, device, socket_path, shutdown).await
                            {
                                tracing::error!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    }
                }
            }
        }
    }

    // Graceful shutdown; dropping the listener removes the socket file
    drop(listener);
    {
        let mut device = device.lock().await;
        if device.connected()
            && let Err(e) = device.call("disconnect", &[], &serde_json::Map::new())
        {
            tracing::warn!("device disconnect failed: {}", e);
        }
    }
    pidfile::clear(&config);

    tracing::info!("hwbridged shutdown complete");
    Ok(())
}

fn init_logging(log_path: &std::path::Path, filter: &str) -> anyhow::Result<WorkerGuard> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt::format::FmtSpan;

    let dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = log_path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("hwbridged.log"));

    // One stable file; the supervisor points users at this exact path
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter)?)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    Ok(guard)
}
