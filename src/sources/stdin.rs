//! Stdin activity source
//!
//! Reads newline-delimited JSON activity records from standard input, the
//! default transport when an editor plugin pipes events straight into the
//! relay process.

use super::ActivitySource;
use crate::RawActivity;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

pub struct StdinSource;

#[async_trait]
impl ActivitySource for StdinSource {
    fn name(&self) -> &'static str {
        "stdin"
    }

    async fn start(&self, tx: mpsc::Sender<RawActivity>) -> anyhow::Result<()> {
        info!("Reading activity events from stdin");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(event) = super::parse_line(&line) {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        }

        info!("Stdin closed, stopping source");
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }
}
