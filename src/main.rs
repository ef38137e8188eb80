use clap::Parser;
use std::process::ExitCode;

use hwbridge::cli::actions;
use hwbridge::cli::args::{Action, Cli};
use hwbridge::config::BridgeConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // CLI diagnostics go to stderr; the daemon owns the log file
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> hwbridge::Result<i32> {
    let mut config = BridgeConfig::resolve()?;
    if let Some(socket) = cli.socket.clone() {
        config.socket_path = socket;
    }

    match cli.action() {
        Action::Start => actions::start(&config).await,
        Action::Stop => actions::stop(&config).await,
        Action::Status => actions::status(&config).await,
        Action::Restart => actions::restart(&config).await,
        Action::Run => actions::run(&config, cli.foreground, &cli.frontend_args).await,
    }
}
