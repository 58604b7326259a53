use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Output format for dashboard dates (`yyyy-MM-dd`).
pub const DAY_FORMAT: &str = "%Y-%m-%d";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Extract the calendar day from a stored date or timestamp string.
///
/// Accepts a bare `YYYY-MM-DD`, naive timestamps with a space or `T`
/// separator, RFC 3339 timestamps, and all-digit Unix seconds. RFC 3339
/// values are converted to UTC before taking the day.
pub fn parse_calendar_day(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(day_from_unix_seconds);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, DAY_FORMAT) {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

/// Calendar day of a Unix timestamp (seconds), in UTC.
pub fn day_from_unix_seconds(secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

/// UTC midnight at the start of `day`.
pub fn start_of_day_utc(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Format the start of `day` (UTC) as `yyyy-MM-dd`.
pub fn format_day(day: NaiveDate) -> String {
    start_of_day_utc(day).format(DAY_FORMAT).to_string()
}
