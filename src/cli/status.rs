//! Status command - shows relay status

pub async fn run() -> anyhow::Result<()> {
    println!("Pulse Relay Status");
    println!("──────────────────");

    if super::is_running() {
        let pid = super::read_pid().unwrap_or(0);
        println!("Status: 🟢 Running (PID: {})", pid);
    } else {
        println!("Status: 🔴 Stopped");
        println!("\nRun 'pulse-relay run' to start the relay");
    }

    Ok(())
}
