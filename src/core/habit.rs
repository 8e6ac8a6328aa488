//! Habit and category model.
//!
//! Habits are identified by an opaque string id and belong to exactly one category.
//! Names are compared case-insensitively both for categories and for habits within
//! a category.

use crate::{
    core::{date_key, reminder::ReminderConfig},
    errors::{Error, Result},
};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// How often a habit is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Due every day
    #[default]
    Daily,
    /// Due once a week on the habit's anchor weekday
    Weekly,
}

impl Frequency {
    /// Lenient mapping used when normalising imported data: anything but `"weekly"` is daily.
    #[must_use]
    pub fn from_lenient(value: &str) -> Self {
        if value == "weekly" {
            Self::Weekly
        } else {
            Self::Daily
        }
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(Error::validation(format!("Invalid frequency: {other}"))),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => f.write_str("daily"),
            Self::Weekly => f.write_str("weekly"),
        }
    }
}

/// A tracked habit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    /// Opaque identifier (`habit_<base36 millis>_<suffix>`)
    pub id: String,
    /// Display name, trimmed and never empty
    pub name: String,
    /// Name of an existing category
    pub category: String,
    /// Tracking cadence
    pub frequency: Frequency,
    /// Creation timestamp; its local weekday is the default weekly anchor
    pub created_at: DateTime<Utc>,
    /// Explicit weekly anchor (0 = Sunday). `None` means "weekday of creation".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_day: Option<u8>,
    /// Reminder settings for this habit
    pub reminder: ReminderConfig,
}

impl Habit {
    /// Builds a new habit with a fresh id and a disabled default reminder.
    #[must_use]
    pub fn new(
        name: String,
        category: String,
        frequency: Frequency,
        created_at: DateTime<Utc>,
    ) -> Self {
        let created_weekday = local_weekday(created_at);
        Self {
            id: generate_habit_id(created_at),
            name,
            category,
            frequency,
            created_at,
            anchor_day: None,
            reminder: ReminderConfig::new(frequency, created_weekday),
        }
    }

    /// Local weekday the habit was created on (Sunday = 0).
    #[must_use]
    pub fn created_weekday(&self) -> u8 {
        local_weekday(self.created_at)
    }

    /// Weekday a weekly habit is due on.
    #[must_use]
    pub fn anchor_weekday(&self) -> u8 {
        self.anchor_day.unwrap_or_else(|| self.created_weekday())
    }
}

/// Partial update applied by `edit_habit`. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HabitEdit {
    /// New display name
    pub name: Option<String>,
    /// New category (must exist)
    pub category: Option<String>,
    /// New frequency; the weekly anchor is not recomputed
    pub frequency: Option<Frequency>,
    /// Explicit weekly anchor day, 0-6. The reminder weekday follows it.
    pub anchor_day: Option<u8>,
}

fn local_weekday(moment: DateTime<Utc>) -> u8 {
    date_key::weekday_index(moment.with_timezone(&Local).date_naive())
}

/// Trims and collapses inner runs of whitespace to a single space.
#[must_use]
pub fn normalize_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Validates and normalises a display name.
pub fn validate_name(value: &str, what: &str) -> Result<String> {
    let name = normalize_text(value);
    if name.is_empty() {
        return Err(Error::validation(format!("{what} name is required.")));
    }
    Ok(name)
}

/// Validates a weekday index.
pub fn validate_weekday(day: i64) -> Result<u8> {
    u8::try_from(day)
        .ok()
        .filter(|d| *d <= 6)
        .ok_or_else(|| Error::validation(format!("Weekday must be between 0 and 6, got {day}")))
}

/// Generates `habit_<base36 millis>_<5 chars>`.
#[must_use]
pub fn generate_habit_id(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(5)
        .collect();
    format!("habit_{}_{suffix}", to_base36(millis))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        // value % 36 < 36
        #[allow(clippy::cast_possible_truncation)]
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Case-folded form of a display name. Every name comparison goes through this.
#[must_use]
pub fn fold_name(value: &str) -> String {
    normalize_text(value).to_lowercase()
}

/// Case-insensitive category lookup returning the stored spelling.
#[must_use]
pub fn find_category<'a>(categories: &'a [String], name: &str) -> Option<&'a String> {
    let wanted = fold_name(name);
    categories.iter().find(|c| fold_name(c) == wanted)
}

/// True if another habit in `category` already uses `name` (case-insensitive).
#[must_use]
pub fn is_duplicate_habit(habits: &[Habit], category: &str, name: &str, except_id: Option<&str>) -> bool {
    let (category, name) = (fold_name(category), fold_name(name));
    habits.iter().any(|h| {
        Some(h.id.as_str()) != except_id
            && fold_name(&h.category) == category
            && fold_name(&h.name) == name
    })
}
