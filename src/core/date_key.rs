//! Date key codec - canonical `YYYY-MM-DD` keys on the local calendar.
//!
//! Every log bucket, reminder slot and aggregation window is indexed by these keys.
//! Keys always come from the machine's local calendar, never UTC, so "today" flips
//! exactly at local midnight.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const KEY_FORMAT: &str = "%Y-%m-%d";

/// Formats a calendar date as its zero-padded `YYYY-MM-DD` key.
#[must_use]
pub fn to_key(date: NaiveDate) -> String {
    date.format(KEY_FORMAT).to_string()
}

/// Parses a strict `YYYY-MM-DD` key back into a date.
///
/// Returns `None` for anything that is not exactly ten characters of a real date,
/// so `"2026-1-5"` and `"2026-02-30"` are both rejected.
#[must_use]
pub fn parse_key(key: &str) -> Option<NaiveDate> {
    if key.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(key, KEY_FORMAT).ok()
}

/// Today's date on the local calendar.
#[must_use]
pub fn today_date() -> NaiveDate {
    Local::now().date_naive()
}

/// Key for today's local date.
#[must_use]
pub fn today() -> String {
    to_key(today_date())
}

/// Current local wall-clock time, used by the reminder checks.
#[must_use]
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Weekday index with Sunday = 0 through Saturday = 6.
#[must_use]
pub fn weekday_index(date: NaiveDate) -> u8 {
    // num_days_from_sunday is always 0..=6
    #[allow(clippy::cast_possible_truncation)]
    let index = date.weekday().num_days_from_sunday() as u8;
    index
}

/// `HH:MM` for the given moment.
#[must_use]
pub fn time_key(moment: NaiveDateTime) -> String {
    format!("{:02}:{:02}", moment.hour(), moment.minute())
}

/// True when `value` is a well-formed `HH:MM` time of day.
#[must_use]
pub fn is_valid_time(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 5
        && bytes[2] == b':'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || b.is_ascii_digit())
        && NaiveTime::parse_from_str(value, "%H:%M").is_ok()
}

/// First day of the month containing `date`.
#[must_use]
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Number of days in the month containing `date`.
#[must_use]
pub fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map_or(31, |last| last.day())
}
