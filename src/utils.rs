//! Utility functions for epg-relay
//!
//! - URL joining and base URL sanitation (`utils::url`)
//! - XMLTV timestamp formatting (`utils::time`)
//! - Storage timestamp parsing

use chrono::{DateTime, NaiveDateTime, Utc};

pub mod time;
pub mod url;

/// Parse datetime from RFC3339 or SQLite's `CURRENT_TIMESTAMP` format
pub fn parse_datetime(datetime_str: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(datetime_str) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive_dt| DateTime::from_naive_utc_and_offset(naive_dt, Utc))
}
