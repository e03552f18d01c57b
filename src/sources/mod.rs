//! Activity sources
//!
//! Each source is responsible for:
//! 1. Receiving raw activity signals from an editor plugin
//! 2. Decoding them into `RawActivity`
//! 3. Emitting events to the batcher's channel
//!
//! The wire format is one JSON object per line:
//! `{"entity": "...", "is_write": false, "cursor_position": 3, "project_file": "..."}`

pub mod fifo;
pub mod stdin;

use crate::RawActivity;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

/// Trait for activity sources
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Name of the source
    fn name(&self) -> &'static str;

    /// Read activity signals and send them to the channel until the input
    /// ends or the receiver is dropped
    async fn start(&self, tx: mpsc::Sender<RawActivity>) -> anyhow::Result<()>;

    /// Check if the source's input is available
    fn is_available(&self) -> bool;
}

/// Decode one wire line. Malformed lines are logged and skipped, never fatal.
pub fn parse_line(line: &str) -> Option<RawActivity> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Skipping malformed activity line: {}", e);
            None
        }
    }
}
