//! Run command - foreground relay loop
//!
//! Wires an activity source to the heartbeat batcher and keeps relaying
//! until the source ends or the process is interrupted.

use super::PID_FILE;
use pulse_relay::batcher::HeartbeatBatcher;
use pulse_relay::dispatch::CliRunner;
use pulse_relay::sources::{fifo::FifoSource, stdin::StdinSource, ActivitySource};
use pulse_relay::{Config, RawActivity};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Options collected from the `run` subcommand flags
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Read events from this named pipe instead of stdin
    pub fifo: Option<PathBuf>,
    pub cli_path: Option<PathBuf>,
    pub editor: Option<String>,
    pub editor_version: Option<String>,
    pub frequency_minutes: Option<u64>,
    pub quiescence_secs: Option<u64>,
}

/// Build the relay config from defaults, environment, then flags
pub fn build_config(opts: &RunOptions) -> Config {
    let mut config = Config::default();

    if let Ok(path) = std::env::var("PULSE_RELAY_CLI_PATH") {
        if !path.is_empty() {
            config.cli_path = PathBuf::from(path);
        }
    }
    if let Ok(editor) = std::env::var("PULSE_RELAY_EDITOR") {
        if !editor.is_empty() {
            config.editor_name = editor;
        }
    }
    if let Ok(version) = std::env::var("PULSE_RELAY_EDITOR_VERSION") {
        if !version.is_empty() {
            config.editor_version = version;
        }
    }

    if let Some(path) = &opts.cli_path {
        config.cli_path = path.clone();
    }
    if let Some(editor) = &opts.editor {
        config.editor_name = editor.clone();
    }
    if let Some(version) = &opts.editor_version {
        config.editor_version = version.clone();
    }
    if let Some(minutes) = opts.frequency_minutes {
        config.frequency_minutes = minutes;
    }
    if let Some(secs) = opts.quiescence_secs {
        config.quiescence = Duration::from_secs(secs);
    }

    config
}

fn write_pid() -> anyhow::Result<()> {
    let pid = std::process::id();
    fs::write(PID_FILE, pid.to_string())?;
    Ok(())
}

fn remove_pid() {
    let _ = fs::remove_file(PID_FILE);
}

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    if super::is_running() {
        println!("⚠️  Pulse Relay is already running!");
        return Ok(());
    }

    write_pid()?;
    let _guard = scopeguard::guard((), |_| {
        remove_pid();
    });

    let config = build_config(&opts);
    info!(
        "Pulse Relay starting (PID: {}), cli: {}, plugin: {}",
        std::process::id(),
        config.cli_path.display(),
        config.user_agent(),
    );
    if !config.cli_path.exists() {
        warn!(
            "wakatime-cli not found at {}, dispatches will fail until it is installed",
            config.cli_path.display()
        );
    }

    let source: Arc<dyn ActivitySource> = match opts.fifo {
        Some(path) => Arc::new(FifoSource::new(path)),
        None => Arc::new(StdinSource),
    };
    info!("Using {} activity source", source.name());

    let batcher = HeartbeatBatcher::new(config, Arc::new(CliRunner));

    let (tx, mut rx) = mpsc::channel::<RawActivity>(100);
    let source_task = tokio::spawn(async move {
        if let Err(e) = source.start(tx).await {
            error!("Activity source error: {:#}", e);
        }
    });

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => batcher.record(event, now_unix()).await,
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    source_task.abort();
    // push out whatever is still queued before exiting
    batcher.flush().await;
    info!("Pulse Relay stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let opts = RunOptions {
            fifo: None,
            cli_path: Some(PathBuf::from("/opt/wakatime-cli")),
            editor: Some("wing".to_string()),
            editor_version: Some("10.0".to_string()),
            frequency_minutes: Some(5),
            quiescence_secs: Some(9),
        };
        let config = build_config(&opts);
        assert_eq!(config.cli_path, PathBuf::from("/opt/wakatime-cli"));
        assert_eq!(config.editor_name, "wing");
        assert_eq!(config.editor_version, "10.0");
        assert_eq!(config.frequency_minutes, 5);
        assert_eq!(config.quiescence, Duration::from_secs(9));
    }
}
