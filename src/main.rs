//! Pulse Relay - Editor Activity Heartbeat Relay
//!
//! Receives raw editor activity events, filters noise, batches accepted
//! events behind a short debounce, and reports each batch to wakatime-cli
//! in a single invocation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cli;

/// Pulse Relay - Editor Activity Heartbeat Relay
#[derive(Parser)]
#[command(name = "pulse-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay in the foreground
    Run {
        /// Read activity events from this named pipe instead of stdin
        #[arg(long)]
        fifo: Option<PathBuf>,

        /// Path to the wakatime-cli binary
        #[arg(long)]
        cli_path: Option<PathBuf>,

        /// Host editor name, used in the plugin user agent
        #[arg(long)]
        editor: Option<String>,

        /// Host editor version, used in the plugin user agent
        #[arg(long)]
        editor_version: Option<String>,

        /// Passive re-trigger window for same-file events, in minutes
        #[arg(long)]
        frequency: Option<u64>,

        /// Quiet period before a drain, in seconds
        #[arg(long)]
        quiescence: Option<u64>,
    },

    /// Stop a running relay
    Stop,

    /// Show relay status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run {
            fifo,
            cli_path,
            editor,
            editor_version,
            frequency,
            quiescence,
        } => {
            cli::run::run(cli::run::RunOptions {
                fifo,
                cli_path,
                editor,
                editor_version,
                frequency_minutes: frequency,
                quiescence_secs: quiescence,
            })
            .await?;
        }
        Commands::Stop => {
            cli::stop::run().await?;
        }
        Commands::Status => {
            cli::status::run().await?;
        }
    }

    Ok(())
}
