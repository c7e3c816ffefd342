//! robot-kit command line entry point.
//!
//! `serve` runs the local companion server; `run`, `stop`, `status` and
//! `reset` are terminal clients for the facade, with `run` providing the
//! same poll-until-finished loop the dashboard uses.

mod poller;

use clap::{Parser, Subcommand};
use colored::Colorize;
use poller::StatusPoller;
use rk_core::bundles::{self, BundleSet};
use rk_core::config;
use rk_protocol::RobotKind;
use rk_server::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_SERVER: &str = "http://127.0.0.1:3001";

#[derive(Parser)]
#[command(
    name = "robot-kit",
    version,
    about = "Local companion server for the court-process dashboard"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the local companion server.
    Serve {
        /// Port to bind on loopback.
        #[arg(long)]
        port: Option<u16>,

        /// Directory containing the automation bundles.
        #[arg(long)]
        bundles_root: Option<PathBuf>,

        /// Python interpreter override.
        #[arg(long)]
        python: Option<PathBuf>,

        /// Configuration file.
        #[arg(long, default_value = "robot-kit.toml")]
        config: PathBuf,
    },

    /// Launch a robot and follow its progress until it finishes.
    Run {
        /// Which robot to launch (stf or stj).
        kind: String,

        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },

    /// Stop the robot currently running.
    Stop {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },

    /// Print the current run status once.
    Status {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },

    /// Clear a finished run back to idle.
    Reset {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve {
            port,
            bundles_root,
            python,
            config,
        } => {
            let file = config::load_config(&config)?;
            let port = port.or(file.port).unwrap_or(config::DEFAULT_PORT);
            let root = bundles_root
                .or(file.bundles_root)
                .unwrap_or_else(|| PathBuf::from("."));
            let python = bundles::resolve_python(python.or(file.python));
            tracing::info!(python = %python.display(), root = %root.display(), "starting");

            let bundles = Arc::new(BundleSet::standard(&root, &python));
            let state = AppState::new(bundles, python);
            // Loopback only: the facade is never exposed beyond this machine.
            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            rk_server::serve(state, addr)
                .await
                .map_err(|e| color_eyre::eyre::eyre!(e))
        }
        Commands::Run { kind, server } => {
            let kind: RobotKind = kind.parse()?;
            let mut poller = StatusPoller::new(server)?;
            poller.run(kind).await?;
            Ok(())
        }
        Commands::Stop { server } => {
            StatusPoller::new(server)?.stop().await?;
            println!("{}", "robot stopped".yellow());
            Ok(())
        }
        Commands::Status { server } => {
            let status = StatusPoller::new(server)?.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Commands::Reset { server } => {
            StatusPoller::new(server)?.reset().await?;
            println!("status reset");
            Ok(())
        }
    }
}
