//! ragcall CLI entry point.
//!
//! `serve` (the default) runs the web app; `status` prints the backend
//! status report for the current configuration and exits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use ragcall::config::AppConfig;
use ragcall::logging;
use ragcall::web::{self, AppState};

/// ragcall: earnings-call rehearsal with retrieval-augmented chat.
#[derive(Parser)]
#[command(name = "ragcall", version, about)]
struct Cli {
    /// Raise the default log level to debug.
    #[arg(long, global = true)]
    debug: bool,

    /// Path to a TOML config file (defaults to `$RAGCALL_CONFIG_PATH` or `./config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute; `serve` when omitted.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the web app.
    Serve {
        /// Bind address override.
        #[arg(long)]
        host: Option<String>,
        /// Port override.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the AI backend status report and exit.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: failed to read .env: {e}");
        }
    }

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if cli.debug {
        config.debug.enabled = true;
    }

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            handle_serve(config).await
        }
        Command::Status => handle_status(config).await,
    }
}

/// Run the web app until Ctrl-C.
async fn handle_serve(config: AppConfig) -> anyhow::Result<()> {
    let _logging_guard = match config.server.logs_dir.as_deref() {
        Some(dir) => Some(logging::init_production(dir, config.debug.enabled)?),
        None => {
            logging::init_cli(config.debug.enabled);
            None
        }
    };

    let listener = web::bind(&config.server.host, config.server.port).await?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        redirect_uri = %format!("{}{}", config.public_base_url(), ragcall::auth::REDIRECT_PATH),
        "ragcall starting"
    );
    if config.rag_debug() {
        warn!("RAG debug enabled; chat responses include token usage");
    }

    let state = AppState::from_config(config).context("failed to build application state")?;
    web::serve(state, listener).await
}

/// Print the `/ai_status` report as JSON.
async fn handle_status(config: AppConfig) -> anyhow::Result<()> {
    logging::init_cli(config.debug.enabled);

    let state = AppState::from_config(config).context("failed to build application state")?;
    let report = ragcall::status::collect(
        &state.config,
        state.search.as_deref(),
        &state.orchestrator,
    )
    .await;
    let json = serde_json::to_string_pretty(&report).context("failed to serialize status")?;
    println!("{json}");
    Ok(())
}
