//! CLI command handlers

pub mod run;
pub mod status;
pub mod stop;

use std::fs;

pub const PID_FILE: &str = "/tmp/pulse-relay.pid";

/// Read the daemon pid from the pid file, if any
pub fn read_pid() -> Option<i32> {
    let pid_str = fs::read_to_string(PID_FILE).ok()?;
    pid_str.trim().parse().ok()
}

/// Check whether a relay process recorded in the pid file is alive
pub fn is_running() -> bool {
    if let Some(pid) = read_pid() {
        unsafe {
            if libc::kill(pid, 0) == 0 {
                return true;
            }
        }
    }
    false
}
