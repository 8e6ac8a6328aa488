//! Reminder configuration, the sent-slot ledger, and the shared due-check.
//!
//! A *slot* is `habitId::YYYY-MM-DD::HH:MM`, the identity of one reminder delivery
//! opportunity. The ledger records slots already delivered; the due-check is a pure
//! function of the current minute and state, so it can run any number of times per
//! minute without producing a second delivery for the same slot.

use crate::{
    core::{
        date_key,
        habit::{Frequency, Habit},
    },
    errors::{Error, Result},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Reminder time used when none (or a malformed one) is configured.
pub const DEFAULT_REMINDER_TIME: &str = "08:00";

/// Per-habit reminder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderConfig {
    /// Armed when true
    pub enabled: bool,
    /// Local time of day, always `HH:MM`
    pub time: String,
    /// Weekday (0 = Sunday) for weekly habits
    pub day: u8,
    /// Last slot delivered by the foreground
    pub last_notified_slot: String,
    /// Mirrors the owning habit's frequency
    pub frequency: Frequency,
}

impl ReminderConfig {
    /// Disabled reminder at the default time on `day`.
    #[must_use]
    pub fn new(frequency: Frequency, day: u8) -> Self {
        Self {
            enabled: false,
            time: DEFAULT_REMINDER_TIME.to_string(),
            day,
            last_notified_slot: String::new(),
            frequency,
        }
    }

    /// Repairs an untrusted reminder object field by field.
    ///
    /// A malformed time falls back to `08:00`, an out-of-range day to `fallback_day`.
    #[must_use]
    pub fn from_value(value: Option<&Value>, frequency: Frequency, fallback_day: u8) -> Self {
        let Some(raw) = value.filter(|v| v.is_object()) else {
            return Self::new(frequency, fallback_day);
        };
        let time = raw
            .get("time")
            .and_then(Value::as_str)
            .filter(|t| date_key::is_valid_time(t))
            .unwrap_or(DEFAULT_REMINDER_TIME)
            .to_string();
        let day = raw
            .get("day")
            .and_then(Value::as_u64)
            .and_then(|d| u8::try_from(d).ok())
            .filter(|d| *d <= 6)
            .unwrap_or(fallback_day);
        Self {
            enabled: raw.get("enabled").and_then(Value::as_bool).unwrap_or(false),
            time,
            day,
            last_notified_slot: raw
                .get("lastNotifiedSlot")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            frequency,
        }
    }
}

/// Partial reminder change. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderUpdate {
    /// Arm or disarm
    pub enabled: Option<bool>,
    /// New `HH:MM` time
    pub time: Option<String>,
    /// New weekday, 0-6
    pub day: Option<i64>,
}

impl ReminderUpdate {
    /// Applies the update, rejecting it as a whole if any field is invalid.
    pub fn apply_to(&self, config: &mut ReminderConfig) -> Result<()> {
        if let Some(time) = &self.time {
            if !date_key::is_valid_time(time) {
                return Err(Error::validation(format!(
                    "Reminder time must be HH:MM, got {time:?}"
                )));
            }
        }
        let day = self
            .day
            .map(crate::core::habit::validate_weekday)
            .transpose()?;

        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(time) = &self.time {
            config.time.clone_from(time);
        }
        if let Some(day) = day {
            config.day = day;
        }
        Ok(())
    }
}

/// Builds the slot identity for one delivery opportunity.
#[must_use]
pub fn slot(habit_id: &str, date_key: &str, time: &str) -> String {
    format!("{habit_id}::{date_key}::{time}")
}

/// Dedup ledger: `slot -> habitId`.
///
/// Behaves as a grow-only set between prunes; [`SentLedger::merge`] is a union, so
/// two diverged copies reconcile without losing a delivery record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentLedger {
    slots: BTreeMap<String, String>,
}

impl SentLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the slot was already delivered.
    #[must_use]
    pub fn contains(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    /// Records a delivered slot.
    pub fn record(&mut self, slot: String, habit_id: &str) {
        self.slots.insert(slot, habit_id.to_string());
    }

    /// Number of recorded slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates slots in lexical order.
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Once above `high_water`, removes the lexically smallest slots until exactly
    /// `low_water` remain. Returns how many were removed.
    pub fn prune(&mut self, high_water: usize, low_water: usize) -> usize {
        if self.slots.len() <= high_water {
            return 0;
        }
        let excess = self.slots.len().saturating_sub(low_water);
        let doomed: Vec<String> = self.slots.keys().take(excess).cloned().collect();
        for key in &doomed {
            self.slots.remove(key);
        }
        doomed.len()
    }

    /// Union with another copy of the ledger. Returns how many slots were new.
    pub fn merge(&mut self, other: &Self) -> usize {
        let before = self.slots.len();
        for (slot, habit_id) in &other.slots {
            self.slots
                .entry(slot.clone())
                .or_insert_with(|| habit_id.clone());
        }
        self.slots.len() - before
    }

    /// Drops every slot belonging to `habit_id`.
    pub fn remove_habit(&mut self, habit_id: &str) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, owner| owner != habit_id);
        before - self.slots.len()
    }

    /// Builds a ledger from untrusted JSON; non-string owners are coerced or dropped.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        let slots = value
            .and_then(Value::as_object)
            .map(|table| {
                table
                    .iter()
                    .filter_map(|(slot, owner)| match owner {
                        Value::String(s) => Some((slot.clone(), s.clone())),
                        Value::Bool(true) | Value::Number(_) => {
                            Some((slot.clone(), owner.to_string()))
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { slots }
    }
}

/// One reminder as published to the background context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderItem {
    /// Owning habit
    pub habit_id: String,
    /// Habit display name, used in the notification body
    #[serde(default)]
    pub name: String,
    /// Habit frequency
    #[serde(default)]
    pub frequency: Frequency,
    /// Armed when true
    #[serde(default)]
    pub enabled: bool,
    /// `HH:MM`
    #[serde(default)]
    pub time: String,
    /// Weekday for weekly habits
    #[serde(default)]
    pub day: u8,
    /// Latest `YYYY-MM-DD` on which the habit was marked done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_done_on: Option<String>,
}

impl ReminderItem {
    /// Snapshot of a habit's reminder for publishing.
    #[must_use]
    pub fn from_habit(habit: &Habit) -> Self {
        Self {
            habit_id: habit.id.clone(),
            name: habit.name.clone(),
            frequency: habit.frequency,
            enabled: habit.reminder.enabled,
            time: habit.reminder.time.clone(),
            day: habit.reminder.day,
            last_done_on: None,
        }
    }

    /// True if the snapshot says the habit was done on `date_key`.
    #[must_use]
    pub fn is_done_on(&self, date_key: &str) -> bool {
        self.last_done_on.as_deref() == Some(date_key)
    }
}

/// A reminder that should fire now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReminder {
    /// Owning habit
    pub habit_id: String,
    /// Habit display name
    pub habit_name: String,
    /// Slot to record once delivered
    pub slot: String,
}

/// Reminders that match `now` and have not been delivered yet.
///
/// An item is due when it is enabled, its time equals the current `HH:MM`, weekly
/// items also match the current weekday, `is_done` is false for its habit, and its
/// slot is absent from `ledger`. The result never contains the same slot twice.
pub fn due_reminders<'a>(
    items: impl IntoIterator<Item = &'a ReminderItem>,
    now: NaiveDateTime,
    ledger: &SentLedger,
    is_done: impl Fn(&str) -> bool,
) -> Vec<DueReminder> {
    let today = date_key::to_key(now.date());
    let current_time = date_key::time_key(now);
    let weekday = date_key::weekday_index(now.date());

    let mut seen = BTreeSet::new();
    let mut due = Vec::new();
    for item in items {
        if !item.enabled || item.time != current_time {
            continue;
        }
        if item.frequency == Frequency::Weekly && item.day != weekday {
            continue;
        }
        if is_done(&item.habit_id) {
            continue;
        }
        let slot = slot(&item.habit_id, &today, &current_time);
        if ledger.contains(&slot) || !seen.insert(slot.clone()) {
            continue;
        }
        due.push(DueReminder {
            habit_id: item.habit_id.clone(),
            habit_name: item.name.clone(),
            slot,
        });
    }
    due
}
