//! Timestamp utilities
//!
//! All timestamps are stored in UTC. Field teams work in East Africa Time
//! (UTC+3, no daylight saving), so "today" and printed dates use that offset.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};

/// East Africa Time offset in seconds
pub const EAT_OFFSET_SECONDS: i32 = 3 * 3600;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// East Africa Time zone
pub fn eat() -> FixedOffset {
    FixedOffset::east_opt(EAT_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix())
}

/// Convert a UTC timestamp to local (EAT) time
pub fn to_local(ts: DateTime<Utc>) -> DateTime<FixedOffset> {
    ts.with_timezone(&eat())
}

/// Calendar date of a UTC timestamp in East Africa Time
pub fn local_date(ts: DateTime<Utc>) -> NaiveDate {
    to_local(ts).date_naive()
}

/// UTC bounds `[start, end)` of a local calendar day
pub fn local_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_local = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let start = DateTime::<Utc>::from_naive_utc_and_offset(start_local, Utc)
        - Duration::seconds(EAT_OFFSET_SECONDS as i64);
    (start, start + Duration::days(1))
}

/// Absolute difference between two timestamps in whole minutes (rounded up)
pub fn minutes_between(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    let secs = (a - b).num_seconds().abs();
    (secs + 59) / 60
}
