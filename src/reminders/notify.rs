//! Notification side effect.
//!
//! Platform adapters implement [`NotificationSink`]. The tag `habit-<id>` lets a
//! platform collapse repeated notifications for the same habit.

use crate::{core::reminder::DueReminder, errors::Result};
use tracing::{info, warn};

/// Title of every reminder notification.
pub const NOTIFICATION_TITLE: &str = "Habit Reminder";

/// A notification ready to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Always [`NOTIFICATION_TITLE`]
    pub title: String,
    /// Mentions the habit name
    pub body: String,
    /// `habit-<habitId>`
    pub tag: String,
    /// Click target
    pub url: String,
}

impl Notification {
    /// Notification for one due reminder.
    #[must_use]
    pub fn for_reminder(due: &DueReminder, app_url: &str) -> Self {
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body: format!("Reminder: Time to complete your habit - {}.", due.habit_name),
            tag: format!("habit-{}", due.habit_id),
            url: app_url.to_string(),
        }
    }
}

/// Platform notification adapters will implement this trait.
pub trait NotificationSink: Send + Sync {
    /// Shows one notification.
    ///
    /// # Errors
    /// Any error means the notification was not shown; the slot stays unrecorded.
    fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Sink that writes notifications to the log. Used by the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        info!(
            tag = %notification.tag,
            url = %notification.url,
            "{}: {}",
            notification.title,
            notification.body
        );
        Ok(())
    }
}

/// Delivers each due reminder and returns the ones that were actually shown.
pub fn deliver_due(
    sink: &dyn NotificationSink,
    due: Vec<DueReminder>,
    app_url: &str,
) -> Vec<DueReminder> {
    due.into_iter()
        .filter(|reminder| {
            let notification = Notification::for_reminder(reminder, app_url);
            match sink.deliver(&notification) {
                Ok(()) => {
                    info!(
                        habit_id = %reminder.habit_id,
                        slot = %reminder.slot,
                        "Reminder delivered"
                    );
                    true
                }
                Err(e) => {
                    warn!(habit_id = %reminder.habit_id, error = %e, "Reminder delivery failed");
                    false
                }
            }
        })
        .collect()
}
