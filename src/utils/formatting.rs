use chrono::{DateTime, Utc};

use crate::db::Checkin;

/// Display format for check-in timestamps, one line per event.
pub fn format_checkin_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_checkin_history(checkins: &[Checkin]) -> String {
    checkins
        .iter()
        .map(|c| format_checkin_time(&c.checkin_time))
        .collect::<Vec<_>>()
        .join("\n")
}
