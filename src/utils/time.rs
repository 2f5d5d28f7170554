//! XMLTV timestamp helpers

use chrono::{DateTime, NaiveDateTime, Utc};

/// XMLTV programme timestamps are always emitted in UTC with an explicit offset
pub const XMLTV_TIME_FORMAT: &str = "%Y%m%d%H%M%S +0000";

/// Render a UTC timestamp as `yyyyMMddHHmmss +0000`
pub fn format_xmltv_time(dt: &DateTime<Utc>) -> String {
    dt.format(XMLTV_TIME_FORMAT).to_string()
}

/// Parse a `yyyyMMddHHmmss +0000` timestamp back into UTC
///
/// Only the UTC offset is accepted since that is the only form we emit.
pub fn parse_xmltv_time(value: &str) -> Option<DateTime<Utc>> {
    let (stamp, offset) = value.trim().split_once(' ')?;
    if offset != "+0000" {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}
