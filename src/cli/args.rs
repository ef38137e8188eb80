use std::path::PathBuf;

use clap::{ArgGroup, Parser};

/// hwbridge - lifecycle manager for the hardware bridge daemon
///
/// Without an action flag, the bridge daemon is started if needed and this
/// process is replaced by the front-end command.
#[derive(Parser)]
#[command(name = "hwbridge")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("action").args(["start", "stop", "status", "restart"])))]
pub struct Cli {
    /// Start the bridge daemon and exit
    #[arg(long)]
    pub start: bool,

    /// Ask a running bridge daemon to shut down
    #[arg(long)]
    pub stop: bool,

    /// Report whether the bridge daemon is running
    #[arg(long)]
    pub status: bool,

    /// Stop the bridge daemon, then start a fresh one
    #[arg(long)]
    pub restart: bool,

    /// Keep the daemon as a child of this process and stop it when the
    /// front-end exits
    #[arg(long, conflicts_with = "action")]
    pub foreground: bool,

    /// Unix socket path override
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Extra arguments appended to the front-end command (HWBRIDGE_FRONTEND)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub frontend_args: Vec<String>,
}

/// The lifecycle action selected by the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Status,
    Restart,
    /// Default action: ensure the daemon runs, then hand off to the front-end.
    Run,
}

impl Cli {
    /// Resolve the action flags; clap has already rejected combinations.
    pub fn action(&self) -> Action {
        if self.start {
            Action::Start
        } else if self.stop {
            Action::Stop
        } else if self.status {
            Action::Status
        } else if self.restart {
            Action::Restart
        } else {
            Action::Run
        }
    }
}
