use chrono::{DateTime, Local};
use std::time::Duration;

/// Formats the timestamp component of a backup snapshot directory name.
///
/// Date plus time-of-day to the second, so repeated runs on the same day get
/// distinct snapshots. Example: "20261019-142503".
pub fn snapshot_stamp(now: &DateTime<Local>) -> String {
    now.format("%Y%m%d-%H%M%S").to_string()
}

/// Returns the current local time in RFC 3339 format, used in the run summary.
pub fn current_timestamp() -> String {
    Local::now().to_rfc3339()
}

/// Converts an elapsed run time into a short human-readable string.
///
/// Picks the largest unit that is non-zero:
/// - "1h 04m" for durations of an hour or more
/// - "3m 12s" for durations of a minute or more
/// - "8.4s" below a minute
pub fn format_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn snapshot_stamp_has_second_granularity() {
        let first = Local.with_ymd_and_hms(2026, 10, 19, 14, 25, 3).unwrap();
        let second = Local.with_ymd_and_hms(2026, 10, 19, 14, 25, 4).unwrap();
        assert_eq!(snapshot_stamp(&first), "20261019-142503");
        assert_ne!(snapshot_stamp(&first), snapshot_stamp(&second));
    }

    #[test]
    fn durations_pick_the_largest_unit() {
        assert_eq!(format_duration(&Duration::from_millis(8_400)), "8.4s");
        assert_eq!(format_duration(&Duration::from_secs(192)), "3m 12s");
        assert_eq!(format_duration(&Duration::from_secs(3_840)), "1h 04m");
    }
}
