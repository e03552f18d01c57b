//! Pulse Relay Library
//!
//! Core components for batching editor activity heartbeats and relaying
//! them to wakatime-cli.

pub mod batcher;
pub mod dispatch;
pub mod filter;
pub mod sources;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A single accepted activity record, queued until the next drain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heartbeat {
    /// Acted-upon resource, usually a file path
    pub entity: String,
    /// Unix seconds with sub-second precision
    pub timestamp: f64,
    /// True if the event came from a save, false for selection changes
    pub is_write: bool,
    /// Cursor offset at event time, if the host reported one
    pub cursor_position: Option<u32>,
    /// Project name resolved at capture time
    pub project: Option<String>,
}

/// A raw activity signal as delivered by the host editor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawActivity {
    /// Resource the user acted on
    pub entity: String,
    /// True for save-completed, false for selection-changed
    pub is_write: bool,
    /// Cursor offset, if the host reports one
    #[serde(default)]
    pub cursor_position: Option<u32>,
    /// Project file handle from the host, if a project is open
    #[serde(default)]
    pub project_file: Option<PathBuf>,
}

/// Configuration for the relay
#[derive(Debug, Clone)]
pub struct Config {
    /// Passive re-trigger window for same-file events, in minutes
    pub frequency_minutes: u64,
    /// Quiet period after the last accepted event before a drain
    pub quiescence: Duration,
    /// Location of the external wakatime-cli binary
    pub cli_path: PathBuf,
    /// Host editor name, used in the plugin user agent
    pub editor_name: String,
    /// Host editor version, used in the plugin user agent
    pub editor_version: String,
    /// Suffix stripped from project filenames when resolving a project name
    pub project_file_suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frequency_minutes: 2,
            quiescence: Duration::from_secs(4),
            cli_path: dirs::home_dir()
                .unwrap_or_default()
                .join(".wakatime")
                .join("wakatime-cli"),
            editor_name: "unknown".to_string(),
            editor_version: "0".to_string(),
            project_file_suffix: ".wpr".to_string(),
        }
    }
}

impl Config {
    /// Plugin user agent passed to wakatime-cli via `--plugin`
    pub fn user_agent(&self) -> String {
        format!(
            "{editor}/{editor_version} {editor}-wakatime/{plugin_version}",
            editor = self.editor_name,
            editor_version = self.editor_version,
            plugin_version = env!("CARGO_PKG_VERSION"),
        )
    }
}

/// Derive a project name from the host's project file handle.
///
/// Takes the base filename and strips the project-file suffix when it is
/// actually present; otherwise the full basename is kept.
pub fn resolve_project_name(project_file: &Path, suffix: &str) -> Option<String> {
    let basename = project_file.file_name()?.to_string_lossy();
    let name = basename.strip_suffix(suffix).unwrap_or(&basename);
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}
