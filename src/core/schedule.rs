//! Schedule predicate - decides whether a habit is due on a date.
//!
//! This is the only place that defines which habits count toward a day's
//! denominator; every aggregation goes through [`is_due_on`].

use crate::core::{
    date_key,
    habit::{Frequency, Habit},
};
use chrono::NaiveDate;

/// Whether `habit` is due on the day named by `date_key`.
///
/// Daily habits are always due. Weekly habits are due when the key's weekday equals
/// the habit's anchor weekday; an unparseable key is never a weekly match.
#[must_use]
pub fn is_due(habit: &Habit, date_key: &str) -> bool {
    match habit.frequency {
        Frequency::Daily => true,
        Frequency::Weekly => {
            date_key::parse_key(date_key).is_some_and(|date| is_due_on(habit, date))
        }
    }
}

/// [`is_due`] for an already-parsed date.
#[must_use]
pub fn is_due_on(habit: &Habit, date: NaiveDate) -> bool {
    match habit.frequency {
        Frequency::Daily => true,
        Frequency::Weekly => date_key::weekday_index(date) == habit.anchor_weekday(),
    }
}

/// Habits due on `date`, in their stored order.
#[must_use]
pub fn scheduled_habits(habits: &[Habit], date: NaiveDate) -> Vec<&Habit> {
    habits.iter().filter(|h| is_due_on(h, date)).collect()
}
