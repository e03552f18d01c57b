//! Activity filter
//!
//! Decides whether a raw activity event represents new, trackable activity
//! or noise from rapid repeated events on the same file.

/// Writes on the same file re-trigger after this many seconds
pub const WRITE_RETRIGGER_SECS: f64 = 2.0;

/// The most recently accepted event.
///
/// Single-writer record: only the batcher's enqueue path mutates it, and only
/// for events it actually queues.
#[derive(Debug, Clone, Default)]
pub struct LastTracked {
    /// File of the last accepted event, None before the first acceptance
    pub file: Option<String>,
    /// Timestamp of the last accepted event, unix seconds
    pub time: f64,
}

impl LastTracked {
    pub fn update(&mut self, entity: &str, timestamp: f64) {
        self.file = Some(entity.to_string());
        self.time = timestamp;
    }
}

/// Returns true when the event is worth recording.
///
/// A different file than last tracked is always significant. Same-file events
/// are accepted only after the passive frequency window, or after a much
/// shorter window for writes.
pub fn should_track(
    last: &LastTracked,
    frequency_minutes: u64,
    entity: &str,
    timestamp: f64,
    is_write: bool,
) -> bool {
    match last.file.as_deref() {
        Some(file) if file == entity => {
            enough_time_passed(last.time, frequency_minutes, timestamp, is_write)
        }
        _ => true,
    }
}

fn enough_time_passed(
    last_time: f64,
    frequency_minutes: u64,
    timestamp: f64,
    is_write: bool,
) -> bool {
    let elapsed = timestamp - last_time;
    if elapsed > (frequency_minutes * 60) as f64 {
        return true;
    }
    if is_write && elapsed > WRITE_RETRIGGER_SECS {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last(file: &str, time: f64) -> LastTracked {
        LastTracked {
            file: Some(file.to_string()),
            time,
        }
    }

    #[test]
    fn test_file_switch_always_accepted() {
        let state = last("a.py", 1000.0);
        assert!(should_track(&state, 2, "b.py", 1000.0, false));
        assert!(should_track(&state, 2, "b.py", 1000.5, true));
        // even with a timestamp before the last tracked one
        assert!(should_track(&state, 2, "b.py", 999.0, false));
    }

    #[test]
    fn test_first_event_always_accepted() {
        let state = LastTracked::default();
        assert!(should_track(&state, 2, "a.py", 0.0, false));
    }

    #[test]
    fn test_rapid_same_file_passive_events_suppressed() {
        let state = last("a.py", 1000.0);
        assert!(!should_track(&state, 2, "a.py", 1001.0, false));
        assert!(should_track(&state, 2, "a.py", 1121.0, false));
    }

    #[test]
    fn test_passive_window_is_exclusive() {
        let state = last("a.py", 1000.0);
        // exactly at the boundary is still suppressed
        assert!(!should_track(&state, 2, "a.py", 1120.0, false));
    }

    #[test]
    fn test_write_events_have_short_retrigger_window() {
        let state = last("a.py", 1000.0);
        assert!(should_track(&state, 2, "a.py", 1003.0, true));
        assert!(!should_track(&state, 2, "a.py", 1001.0, true));
    }

    #[test]
    fn test_update_overwrites_record() {
        let mut state = LastTracked::default();
        state.update("a.py", 5.0);
        assert_eq!(state.file.as_deref(), Some("a.py"));
        assert_eq!(state.time, 5.0);
        state.update("b.py", 9.0);
        assert_eq!(state.file.as_deref(), Some("b.py"));
        assert_eq!(state.time, 9.0);
    }
}
