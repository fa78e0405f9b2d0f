//! Campus - command-line console for the school-management API.
//!
//! Main entry point for the Campus CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use campus_client::ClientEvent;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

mod commands;

use commands::{auth, config, resources};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Campus - school-management console
#[derive(Parser)]
#[command(name = "campus")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// API server URL (default: http://localhost:3000)
    #[arg(long, global = true, env = "CAMPUS_SERVER_URL")]
    pub server: Option<String>,

    /// Directory holding config.toml, the session and logs
    #[arg(long, global = true, env = "CAMPUS_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, sign out and inspect the session
    Auth(auth::AuthArgs),

    /// List records of a resource
    List(resources::ListArgs),

    /// Show one record
    Get(resources::GetArgs),

    /// Delete one record
    Delete(resources::DeleteArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_dir = cli.config_dir.clone().or_else(campus_config::xdg_config_dir);
    let _guard = init_tracing(cli.verbose, config_dir.as_ref());

    let (events, mut rx) = mpsc::unbounded_channel();
    let result = run(cli, config_dir, events).await;

    // Every client has been dropped by now, so the channel is drained.
    let mut reported = false;
    while let Ok(event) = rx.try_recv() {
        report(&event);
        reported = true;
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !reported {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cli: Cli,
    config_dir: Option<PathBuf>,
    events: mpsc::UnboundedSender<ClientEvent>,
) -> Result<()> {
    let loaded = campus_config::load_config_with_options(None, cli.config_dir.as_deref())?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let mut config = loaded.config.clone();
    if let Some(url) = cli.server {
        config.set_server_url(url);
    }
    config.validate()?;

    let ctx = commands::Context {
        config,
        loaded,
        config_dir,
        json_output: cli.json,
        verbose: cli.verbose,
        events,
    };

    match cli.command {
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::List(args) => resources::list(args, &ctx).await,
        Commands::Get(args) => resources::get(args, &ctx).await,
        Commands::Delete(args) => resources::delete(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Console (human-readable) plus rotating JSON file under `<config dir>/logs`.
fn init_tracing(
    verbose: bool,
    config_dir: Option<&PathBuf>,
) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::prelude::*;

    let filter = if verbose {
        "campus=debug,campus_client=debug,campus_config=debug,info"
    } else {
        "campus=warn,campus_client=warn,error"
    };

    let log_dir = config_dir
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "campus.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "campus=trace,campus_client=trace,campus_config=trace,info",
                )),
        )
        .init();

    guard
}

fn report(event: &ClientEvent) {
    match event {
        ClientEvent::SessionExpired => {
            eprintln!("Your session has expired. Run 'campus auth login' to sign in again.");
        }
        ClientEvent::RequestFailed {
            status: Some(status),
            message,
        } => eprintln!("Error ({status}): {message}"),
        ClientEvent::RequestFailed {
            status: None,
            message,
        } => eprintln!("Error: {message}"),
    }
}
