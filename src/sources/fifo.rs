//! Named-pipe activity source
//!
//! Reads the same JSON-lines wire format as the stdin source from a FIFO, so
//! an editor plugin can deliver events to an already-running relay. Opening
//! the pipe is retried with bounded backoff in case the plugin creates it
//! after the relay starts.

use super::ActivitySource;
use crate::RawActivity;
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

const MAX_OPEN_ATTEMPTS: u32 = 10;
const BASE_BACKOFF_MS: u64 = 250;

pub struct FifoSource {
    path: PathBuf,
}

impl FifoSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ActivitySource for FifoSource {
    fn name(&self) -> &'static str {
        "fifo"
    }

    async fn start(&self, tx: mpsc::Sender<RawActivity>) -> anyhow::Result<()> {
        info!("Reading activity events from {}", self.path.display());

        let mut attempts = 0u32;
        loop {
            let file = match tokio::fs::File::open(&self.path).await {
                Ok(file) => {
                    attempts = 0;
                    file
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= MAX_OPEN_ATTEMPTS {
                        return Err(e).with_context(|| {
                            format!("Failed to open pipe {}", self.path.display())
                        });
                    }
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS << attempts.min(6));
                    warn!(
                        "Cannot open {} ({}), retrying in {:?}",
                        self.path.display(),
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            };

            let mut lines = BufReader::new(file).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(event) = super::parse_line(&line) {
                    if tx.send(event).await.is_err() {
                        return Ok(());
                    }
                }
            }
            // writer side closed the pipe; reopen and keep listening
        }
    }

    fn is_available(&self) -> bool {
        self.path.exists()
    }
}
