use chrono::{DateTime, Local, Utc};

/// Convert epoch milliseconds into a UTC datetime
pub fn datetime_from_millis(timestamp_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_default()
}

/// Function to format an epoch-millisecond timestamp as readable date
pub fn format_timestamp(timestamp_ms: i64) -> String {
    datetime_from_millis(timestamp_ms)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Format a transaction date the way the ledger shows it, e.g. "Oct 15, 2025 09:30"
pub fn format_transaction_date(timestamp_ms: i64) -> String {
    datetime_from_millis(timestamp_ms)
        .format("%b %-d, %Y %H:%M")
        .to_string()
}

/// Format duration in milliseconds to human readable string
pub fn format_duration(millis: i64) -> String {
    let seconds = millis.max(0) / 1000;
    if seconds < 60 {
        format!("{} seconds", seconds)
    } else if seconds < 3600 {
        format!("{} minutes", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours", seconds / 3600)
    } else {
        format!("{} days", seconds / 86400)
    }
}

/// Convert a UTC epoch-millisecond timestamp to a local time string
pub fn utc_to_local(timestamp_ms: i64) -> String {
    let local_time: DateTime<Local> = DateTime::from(datetime_from_millis(timestamp_ms));
    local_time.format("%Y-%m-%d %H:%M:%S %Z").to_string()
}
