//! Shared test utilities for `HabitBuddy`.
//!
//! This module provides common helpers for setting up test databases, fixed dates,
//! habits with a controlled creation day, and a notification sink that records
//! what it was asked to show.

use crate::{
    core::habit::{Frequency, Habit},
    errors::Result,
    reminders::notify::{Notification, NotificationSink},
};
use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc};
use sea_orm::DatabaseConnection;
use std::sync::Mutex;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Initializes a tracing subscriber that writes through the test harness.
/// Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// A calendar date. Panics on an impossible date, which is a test bug.
#[allow(clippy::unwrap_used)]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// The UTC instant of a local wall-clock time, so weekday checks match the local calendar.
#[allow(clippy::unwrap_used)]
pub fn local_utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    let naive = date(year, month, day).and_hms_opt(hour, minute, 0).unwrap();
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap()
        .with_timezone(&Utc)
}

/// A habit created at local noon on `created`.
///
/// # Defaults
/// * `category`: `"Study"`
/// * reminder disabled at 08:00 on the creation weekday
pub fn habit_created_on(name: &str, frequency: Frequency, created: NaiveDate) -> Habit {
    let created_at = local_utc(created.year(), created.month(), created.day(), 12, 0);
    Habit::new(name.to_string(), "Study".to_string(), frequency, created_at)
}

/// Sink that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Everything delivered so far.
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|list| list.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingNotifier {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        if let Ok(mut list) = self.delivered.lock() {
            list.push(notification.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::date_key;

    #[test]
    fn test_habit_created_on_uses_local_weekday() {
        init_test_tracing();
        // 2026-10-12 is a Monday
        let habit = habit_created_on("Run", Frequency::Weekly, date(2026, 10, 12));
        assert_eq!(habit.created_weekday(), 1);
        assert_eq!(
            habit.created_at.with_timezone(&Local).date_naive(),
            date(2026, 10, 12)
        );
        assert_eq!(date_key::weekday_index(date(2026, 10, 12)), 1);
    }
}
