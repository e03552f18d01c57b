//! Heartbeat dispatch to wakatime-cli
//!
//! Builds the command-line invocation for a drained batch (primary heartbeat
//! as arguments, extras as a JSON payload on stdin), runs the external CLI,
//! and classifies the exit status. The actual spawn/wait/capture sits behind
//! the `CommandRunner` trait so dispatch logic is testable without spawning
//! real processes.

use crate::{Config, Heartbeat};
use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Exit code wakatime-cli returns while still initializing or rate limited
pub const RATE_LIMITED_EXIT: i32 = 102;

/// One heartbeat in the `--extra-heartbeats` stdin payload
#[derive(Debug, Serialize)]
struct WireHeartbeat<'a> {
    entity: &'a str,
    timestamp: f64,
    is_write: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    alternate_project: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursorpos: Option<String>,
}

impl<'a> From<&'a Heartbeat> for WireHeartbeat<'a> {
    fn from(hb: &'a Heartbeat) -> Self {
        Self {
            entity: &hb.entity,
            timestamp: hb.timestamp,
            is_write: hb.is_write,
            alternate_project: hb.project.as_deref(),
            cursorpos: hb.cursor_position.map(|pos| pos.to_string()),
        }
    }
}

/// Arguments for one wakatime-cli invocation, primary heartbeat only.
///
/// The binary path is not included; the runner receives it separately.
pub fn build_args(primary: &Heartbeat, user_agent: &str, has_extras: bool) -> Vec<String> {
    let mut args = vec![
        "--entity".to_string(),
        primary.entity.clone(),
        "--time".to_string(),
        format!("{:.6}", primary.timestamp),
        "--plugin".to_string(),
        user_agent.to_string(),
    ];
    if primary.is_write {
        args.push("--write".to_string());
    }
    if let Some(project) = &primary.project {
        args.push("--alternate-project".to_string());
        args.push(project.clone());
    }
    if let Some(pos) = primary.cursor_position {
        args.push("--cursorpos".to_string());
        args.push(pos.to_string());
    }
    if has_extras {
        args.push("--extra-heartbeats".to_string());
    }
    args
}

/// Serialize extra heartbeats as the newline-terminated JSON array the CLI
/// expects on stdin.
pub fn extras_payload(extras: &[Heartbeat]) -> anyhow::Result<String> {
    let wire: Vec<WireHeartbeat<'_>> = extras.iter().map(WireHeartbeat::from).collect();
    let json = serde_json::to_string(&wire).context("Failed to serialize extra heartbeats")?;
    Ok(format!("{}\n", json))
}

/// Mask the API key in an argument list before logging it.
///
/// All but the last 4 characters of the value following `--key` are replaced.
pub fn obfuscate_api_key(args: &[String]) -> Vec<String> {
    let mut masked = args.to_vec();
    if let Some(idx) = masked.iter().position(|arg| arg == "--key") {
        if let Some(key) = masked.get(idx + 1) {
            let tail_start = key.chars().count().saturating_sub(4);
            let tail: String = key.chars().skip(tail_start).collect();
            masked[idx + 1] = format!("XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXX{}", tail);
        }
    }
    masked
}

/// Decode captured process output for logging, never failing.
///
/// Strict UTF-8 first, then lossy with replacement characters.
pub fn decode_output(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// How one dispatch attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Exit code 0
    Success,
    /// Exit code 102: CLI still initializing or rate limited, transient
    RateLimited,
    /// Any other exit code, or no exit code (killed by signal)
    Failed(Option<i32>),
}

/// Map an exit status to an outcome
pub fn classify_exit(status: Option<i32>) -> DispatchOutcome {
    match status {
        Some(0) => DispatchOutcome::Success,
        Some(RATE_LIMITED_EXIT) => DispatchOutcome::RateLimited,
        other => DispatchOutcome::Failed(other),
    }
}

/// Captured result of one external-command run
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Exit code, None if terminated by a signal
    pub status: Option<i32>,
    /// Combined stdout and stderr bytes
    pub output: Vec<u8>,
}

/// Spawns the external command, feeds it stdin when asked, and captures
/// combined output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        stdin_payload: Option<&str>,
    ) -> anyhow::Result<RunOutput>;
}

/// Real runner backed by `tokio::process`
pub struct CliRunner;

#[async_trait]
impl CommandRunner for CliRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        stdin_payload: Option<&str>,
    ) -> anyhow::Result<RunOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if stdin_payload.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {}", program.display()))?;

        if let Some(payload) = stdin_payload {
            let mut stdin = child
                .stdin
                .take()
                .context("Child process stdin was not captured")?;
            stdin
                .write_all(payload.as_bytes())
                .await
                .context("Failed to write extra heartbeats to stdin")?;
            // close stdin so the CLI sees EOF after the payload
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for wakatime-cli")?;

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        Ok(RunOutput {
            status: output.status.code(),
            output: combined,
        })
    }
}

/// Sends drained batches to the external CLI
pub struct Dispatcher {
    config: Config,
    runner: Arc<dyn CommandRunner>,
}

impl Dispatcher {
    pub fn new(config: Config, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Dispatch one batch: primary on the command line, extras via stdin.
    ///
    /// All failures terminate here; the batch is dropped and the outcome is
    /// only recorded through logging.
    pub async fn send(&self, primary: Heartbeat, extras: Vec<Heartbeat>) -> DispatchOutcome {
        let user_agent = self.config.user_agent();
        let args = build_args(&primary, &user_agent, !extras.is_empty());

        let payload = if extras.is_empty() {
            None
        } else {
            match extras_payload(&extras) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    error!("Dropping batch: {:#}", e);
                    return DispatchOutcome::Failed(None);
                }
            }
        };

        let mut display_cmd = vec![self.config.cli_path.display().to_string()];
        display_cmd.extend_from_slice(&args);
        info!("{}", obfuscate_api_key(&display_cmd).join(" "));

        let run = self
            .runner
            .run(&self.config.cli_path, &args, payload.as_deref())
            .await;

        let result = match run {
            Ok(result) => result,
            Err(e) => {
                error!("Dropping batch: {:#}", e);
                return DispatchOutcome::Failed(None);
            }
        };

        let outcome = classify_exit(result.status);
        match outcome {
            DispatchOutcome::Success => {
                debug!("wakatime-cli exited with status: 0");
            }
            DispatchOutcome::RateLimited => {
                warn!("wakatime-cli exited with status: {}", RATE_LIMITED_EXIT);
            }
            DispatchOutcome::Failed(status) => match status {
                Some(code) => error!("wakatime-cli exited with status: {}", code),
                None => error!("wakatime-cli terminated without an exit code"),
            },
        }
        if !result.output.is_empty() {
            error!("wakatime-cli output: {}", decode_output(&result.output));
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat(entity: &str, timestamp: f64, is_write: bool) -> Heartbeat {
        Heartbeat {
            entity: entity.to_string(),
            timestamp,
            is_write,
            cursor_position: None,
            project: None,
        }
    }

    #[test]
    fn test_build_args_minimal() {
        let hb = heartbeat("/tmp/a.py", 1700000000.25, false);
        let args = build_args(&hb, "wing/10 wing-wakatime/0.1.0", false);
        assert_eq!(
            args,
            vec![
                "--entity",
                "/tmp/a.py",
                "--time",
                "1700000000.250000",
                "--plugin",
                "wing/10 wing-wakatime/0.1.0",
            ]
        );
    }

    #[test]
    fn test_build_args_all_fields() {
        let hb = Heartbeat {
            entity: "/tmp/a.py".to_string(),
            timestamp: 1700000000.0,
            is_write: true,
            cursor_position: Some(42),
            project: Some("myapp".to_string()),
        };
        let args = build_args(&hb, "ua", true);
        assert!(args.contains(&"--write".to_string()));
        let idx = args.iter().position(|a| a == "--alternate-project").unwrap();
        assert_eq!(args[idx + 1], "myapp");
        let idx = args.iter().position(|a| a == "--cursorpos").unwrap();
        assert_eq!(args[idx + 1], "42");
        assert_eq!(args.last().unwrap(), "--extra-heartbeats");
    }

    #[test]
    fn test_extras_payload_shape() {
        let extras = vec![
            Heartbeat {
                entity: "a.py".to_string(),
                timestamp: 10.5,
                is_write: false,
                cursor_position: Some(7),
                project: Some("proj".to_string()),
            },
            heartbeat("b.py", 11.0, true),
        ];
        let payload = extras_payload(&extras).unwrap();
        assert!(payload.ends_with('\n'));

        let parsed: serde_json::Value = serde_json::from_str(payload.trim_end()).unwrap();
        let list = parsed.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["entity"], "a.py");
        assert_eq!(list[0]["alternate_project"], "proj");
        assert_eq!(list[0]["cursorpos"], "7");
        assert_eq!(list[1]["entity"], "b.py");
        assert_eq!(list[1]["is_write"], true);
        // absent optional fields are omitted, not null
        assert!(list[1].get("alternate_project").is_none());
        assert!(list[1].get("cursorpos").is_none());
    }

    #[test]
    fn test_classify_exit() {
        assert_eq!(classify_exit(Some(0)), DispatchOutcome::Success);
        assert_eq!(classify_exit(Some(102)), DispatchOutcome::RateLimited);
        assert_eq!(classify_exit(Some(1)), DispatchOutcome::Failed(Some(1)));
        assert_eq!(classify_exit(None), DispatchOutcome::Failed(None));
    }

    #[test]
    fn test_obfuscate_api_key() {
        let args: Vec<String> = [
            "wakatime-cli",
            "--entity",
            "a.py",
            "--key",
            "waka_12345678-1234-1234-1234-123456789abc",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let masked = obfuscate_api_key(&args);
        assert_eq!(masked[4], "XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXX9abc");
        // everything else untouched
        assert_eq!(masked[0], "wakatime-cli");
        assert_eq!(masked[2], "a.py");
    }

    #[test]
    fn test_obfuscate_without_key_is_identity() {
        let args: Vec<String> = ["--entity", "a.py"].iter().map(|s| s.to_string()).collect();
        assert_eq!(obfuscate_api_key(&args), args);
    }

    #[test]
    fn test_decode_output_lenient() {
        assert_eq!(decode_output(b"plain text"), "plain text");
        let decoded = decode_output(&[0x68, 0x69, 0xff, 0xfe]);
        assert!(decoded.starts_with("hi"));
        assert!(decoded.contains('\u{fffd}'));
    }
}
