//! Stop command - stops a running relay

use anyhow::bail;
use tracing::info;

pub async fn run() -> anyhow::Result<()> {
    let Some(pid) = super::read_pid() else {
        println!("Pulse Relay is not running");
        return Ok(());
    };

    info!("Stopping Pulse Relay (PID: {})...", pid);
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result != 0 {
        bail!("Failed to signal process {}", pid);
    }

    info!("Pulse Relay stopped");
    Ok(())
}
