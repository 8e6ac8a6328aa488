//! Log store - the sparse `dateKey -> (habitId -> status)` completion log.
//!
//! "Pending" is never stored: a missing bucket or a missing entry reads as pending.
//! Buckets emptied by a reset or a habit deletion are removed immediately. The only
//! empty bucket that may exist is the one [`LogStore::ensure_day`] creates for today.

use crate::{
    core::date_key,
    errors::{Error, Result},
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, str::FromStr};

/// A stored completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Completed
    Done,
    /// Deliberately skipped
    Skip,
}

/// The status a caller reads back for a habit on a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayStatus {
    /// Completed
    Done,
    /// Deliberately skipped
    Skip,
    /// No entry recorded
    Pending,
}

impl From<Status> for DayStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Done => Self::Done,
            Status::Skip => Self::Skip,
        }
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Done => "done",
            Self::Skip => "skip",
            Self::Pending => "pending",
        })
    }
}

/// A status-setting action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusUpdate {
    /// Mark done
    Done,
    /// Mark skipped
    Skip,
    /// Remove the entry so the day reads as pending again
    Reset,
}

impl FromStr for StatusUpdate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "done" => Ok(Self::Done),
            "skip" => Ok(Self::Skip),
            "reset" => Ok(Self::Reset),
            other => Err(Error::validation(format!("Invalid status: {other}"))),
        }
    }
}

type DayLog = BTreeMap<String, Status>;

/// Sparse per-day completion log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogStore {
    days: BTreeMap<String, DayLog>,
}

impl LogStore {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a status action. Returns `true` if the store changed.
    ///
    /// A reset with no existing entry is a no-op, even when today's empty bucket
    /// is present.
    pub fn set_status(&mut self, habit_id: &str, date_key: &str, update: StatusUpdate) -> bool {
        let status = match update {
            StatusUpdate::Done => Status::Done,
            StatusUpdate::Skip => Status::Skip,
            StatusUpdate::Reset => return self.remove_entry(habit_id, date_key),
        };
        let bucket = self.days.entry(date_key.to_string()).or_default();
        bucket.insert(habit_id.to_string(), status) != Some(status)
    }

    fn remove_entry(&mut self, habit_id: &str, date_key: &str) -> bool {
        let Some(bucket) = self.days.get_mut(date_key) else {
            return false;
        };
        if bucket.remove(habit_id).is_none() {
            return false;
        }
        if bucket.is_empty() {
            self.days.remove(date_key);
        }
        true
    }

    /// Reads a habit's status; missing data is `Pending`.
    #[must_use]
    pub fn get_status(&self, habit_id: &str, date_key: &str) -> DayStatus {
        self.days
            .get(date_key)
            .and_then(|bucket| bucket.get(habit_id))
            .map_or(DayStatus::Pending, |s| DayStatus::from(*s))
    }

    /// Shorthand for `get_status(..) == Done`.
    #[must_use]
    pub fn is_done(&self, habit_id: &str, date_key: &str) -> bool {
        self.get_status(habit_id, date_key) == DayStatus::Done
    }

    /// Removes every entry for `habit_id`, dropping emptied buckets.
    /// Returns how many entries were removed.
    pub fn prune_habit(&mut self, habit_id: &str) -> usize {
        let mut removed = 0;
        self.days.retain(|_, bucket| {
            if bucket.remove(habit_id).is_some() {
                removed += 1;
                return !bucket.is_empty();
            }
            true
        });
        removed
    }

    /// Makes sure a bucket exists for `date_key` (day rollover). Returns `true` if created.
    pub fn ensure_day(&mut self, date_key: &str) -> bool {
        if self.days.contains_key(date_key) {
            return false;
        }
        self.days.insert(date_key.to_string(), DayLog::new());
        true
    }

    /// True if a bucket exists for the key (possibly empty).
    #[must_use]
    pub fn has_day(&self, date_key: &str) -> bool {
        self.days.contains_key(date_key)
    }

    /// Number of date buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// True if there are no buckets at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Number of days in `year`/`month` (1-based) on which the habit is done.
    #[must_use]
    pub fn done_count_in_month(&self, habit_id: &str, year: i32, month: u32) -> u32 {
        self.count_done(habit_id, |date| date.year() == year && date.month() == month)
    }

    /// Number of days in `year` on which the habit is done.
    #[must_use]
    pub fn done_count_in_year(&self, habit_id: &str, year: i32) -> u32 {
        self.count_done(habit_id, |date| date.year() == year)
    }

    /// Latest day key on which the habit is done.
    #[must_use]
    pub fn last_done(&self, habit_id: &str) -> Option<&str> {
        self.days
            .iter()
            .rev()
            .find(|(_, bucket)| bucket.get(habit_id) == Some(&Status::Done))
            .map(|(key, _)| key.as_str())
    }

    fn count_done(&self, habit_id: &str, in_scope: impl Fn(chrono::NaiveDate) -> bool) -> u32 {
        let count = self
            .days
            .iter()
            .filter(|(key, bucket)| {
                bucket.get(habit_id) == Some(&Status::Done)
                    && date_key::parse_key(key).is_some_and(&in_scope)
            })
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Builds a log from untrusted JSON.
    ///
    /// Keys that are not valid date keys, entries whose status is not `done`/`skip`,
    /// and buckets left empty are dropped rather than failing the whole document.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some(days) = value.as_object() else {
            return Self::default();
        };
        let mut store = Self::default();
        for (key, bucket) in days {
            if date_key::parse_key(key).is_none() {
                continue;
            }
            let Some(entries) = bucket.as_object() else {
                continue;
            };
            let day: DayLog = entries
                .iter()
                .filter_map(|(habit_id, status)| {
                    serde_json::from_value::<Status>(status.clone())
                        .ok()
                        .map(|s| (habit_id.clone(), s))
                })
                .collect();
            if !day.is_empty() {
                store.days.insert(key.clone(), day);
            }
        }
        store
    }
}
