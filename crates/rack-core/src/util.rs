//! Shared utility functions used across multiple modules.

use chrono::{DateTime, SubsecRound, Utc};

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current time truncated to millisecond precision.
///
/// Edit stamps are compared for exact equality after a round trip through the
/// remote store, so they must never carry more precision than it keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Current Unix timestamp in seconds.
pub fn unix_timestamp_now() -> i64 {
    Utc::now().timestamp()
}
