//! Habit service - the only mutation surface of the application state.
//!
//! Every operation validates first, applies the change to the in-memory document,
//! then writes the whole document back as one row. When that write fails the
//! in-memory change is kept and the persistence error is returned, so callers can
//! warn the user without losing the change; the next successful write catches up.
//!
//! Operations that touch reminder configuration also republish it to the background
//! worker through the [`ReminderLink`], when one is attached.

use crate::{
    config::settings::Settings,
    core::{
        date_key,
        goals::{DerivedGoal, GoalKind},
        habit::{Frequency, Habit, HabitEdit},
        log_store::StatusUpdate,
        reminder::{self, DueReminder, ReminderUpdate},
        state::AppState,
        stats::{self, GoalInsight},
        store,
    },
    errors::{Error, Result},
    reminders::{
        notify::{self, NotificationSink},
        protocol::{ReminderLink, ReminderPayload, ReminderRecord},
    },
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sea_orm::DatabaseConnection;
use tracing::{debug, info, instrument, warn};

/// Owns the application state and its durable copy.
#[derive(Debug)]
pub struct HabitService {
    db: DatabaseConnection,
    settings: Settings,
    state: AppState,
    link: Option<ReminderLink>,
}

impl HabitService {
    /// Wraps an already-built state. Nothing is read or written.
    #[must_use]
    pub const fn new(db: DatabaseConnection, settings: Settings, state: AppState) -> Self {
        Self {
            db,
            settings,
            state,
            link: None,
        }
    }

    /// Loads the stored document (falling back to legacy keys) or starts fresh.
    ///
    /// A stored document that is not valid JSON is replaced by a fresh one rather
    /// than blocking startup. A document found under a legacy key is rewritten under
    /// the current key.
    ///
    /// # Errors
    /// Only database read failures.
    pub async fn load(db: DatabaseConnection, settings: Settings) -> Result<Self> {
        let defaults = settings.state_defaults();
        let now = Utc::now();
        let (state, migrate) = match store::load_state_text(&db).await? {
            Some((key, raw)) => match AppState::from_json_str(&raw, &defaults, now) {
                Ok(state) => {
                    info!(key, habits = state.habits().len(), "Loaded habit state");
                    (state, key != store::STATE_KEY)
                }
                Err(e) => {
                    warn!(key, error = %e, "Stored habit state is unreadable, starting fresh");
                    (AppState::new(&defaults), false)
                }
            },
            None => {
                info!("No stored habit state, starting fresh");
                (AppState::new(&defaults), false)
            }
        };

        let service = Self::new(db, settings, state);
        if migrate {
            // Not fatal: the next mutation writes the current key anyway
            let _ = service.flush().await;
        }
        Ok(service)
    }

    /// Attaches the background worker's channel.
    #[must_use]
    pub fn with_link(mut self, link: ReminderLink) -> Self {
        self.link = Some(link);
        self
    }

    /// Current state, read-only.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Settings the service was built with.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Writes the whole document under the current key.
    async fn flush(&self) -> Result<()> {
        let raw = self.state.to_json()?;
        store::store_raw(&self.db, store::STATE_KEY, raw)
            .await
            .map_err(|e| Error::Persistence {
                message: format!("habit state not saved: {e}"),
            })
            .inspect_err(|e| warn!(error = %e, "Habit state not persisted, keeping in-memory copy"))
    }

    /// Flushes, then republishes reminders if asked. The flush result is returned
    /// after publishing so a failed write never suppresses the sync.
    async fn commit(&self, publish: bool) -> Result<()> {
        let flushed = self.flush().await;
        if publish {
            self.publish_reminders();
        }
        flushed
    }

    /// Snapshot sent to the background worker.
    #[must_use]
    pub fn reminder_payload(&self) -> ReminderPayload {
        ReminderPayload {
            app_url: self.settings.app_url.clone(),
            reminders: self.state.reminder_items(),
            sent_map: self.state.sent_map().clone(),
        }
    }

    /// Sends the reminder snapshot plus a check trigger. An unreachable worker is ignored.
    pub fn publish_reminders(&self) {
        let Some(link) = &self.link else {
            return;
        };
        if link.publish(self.reminder_payload()).is_err() {
            debug!("Background worker unreachable, it keeps its last payload");
        }
    }

    // ----- categories -----

    /// Adds a category and returns its normalised name.
    #[instrument(skip(self))]
    pub async fn add_category(&mut self, name: &str) -> Result<String> {
        let name = self.state.add_category(name)?;
        self.commit(false).await?;
        Ok(name)
    }

    /// Habits that [`Self::delete_category`] would remove, for confirmation.
    #[must_use]
    pub fn habits_in_category(&self, category: &str) -> Vec<&Habit> {
        self.state.habits_in_category(category)
    }

    /// Deletes a category with all its habits. Returns the removed habit ids.
    #[instrument(skip(self))]
    pub async fn delete_category(&mut self, name: &str) -> Result<Vec<String>> {
        let fallback = self.settings.state_defaults().fallback_category;
        let removed = self.state.delete_category(name, &fallback)?;
        self.commit(!removed.is_empty()).await?;
        Ok(removed)
    }

    // ----- habits -----

    /// Adds a habit created now. Returns its id.
    pub async fn add_habit(
        &mut self,
        name: &str,
        category: &str,
        frequency: Frequency,
    ) -> Result<String> {
        self.add_habit_at(name, category, frequency, Utc::now())
            .await
    }

    /// Adds a habit with an explicit creation time. Returns its id.
    #[instrument(skip(self))]
    pub async fn add_habit_at(
        &mut self,
        name: &str,
        category: &str,
        frequency: Frequency,
        created_at: DateTime<Utc>,
    ) -> Result<String> {
        let id = self.state.add_habit(name, category, frequency, created_at)?;
        self.commit(true).await?;
        Ok(id)
    }

    /// Edits name, category, frequency or weekly anchor.
    #[instrument(skip(self))]
    pub async fn edit_habit(&mut self, habit_id: &str, edit: &HabitEdit) -> Result<()> {
        self.state.edit_habit(habit_id, edit)?;
        self.commit(true).await
    }

    /// Deletes a habit with its log entries, goals, derived goal and ledger slots.
    #[instrument(skip(self))]
    pub async fn delete_habit(&mut self, habit_id: &str) -> Result<Habit> {
        let habit = self.state.delete_habit(habit_id)?;
        self.commit(true).await?;
        Ok(habit)
    }

    // ----- log -----

    /// Sets done/skip or resets a day. Returns `true` if the log changed; an
    /// unchanged log is not rewritten. A change is republished so the worker sees
    /// the habit's latest done day.
    #[instrument(skip(self))]
    pub async fn set_status(
        &mut self,
        habit_id: &str,
        date_key: &str,
        update: StatusUpdate,
    ) -> Result<bool> {
        let changed = self.state.set_status(habit_id, date_key, update)?;
        if changed {
            self.commit(true).await?;
        }
        Ok(changed)
    }

    /// Day rollover: makes sure today's bucket exists. Returns `true` if it was created.
    #[instrument(skip(self))]
    pub async fn rollover(&mut self, today: NaiveDate) -> Result<bool> {
        let created = self.state.ensure_day(&date_key::to_key(today));
        if created {
            debug!("Created log bucket for the new day");
            self.commit(false).await?;
        }
        Ok(created)
    }

    // ----- goals -----

    /// Sets a monthly or yearly target.
    #[instrument(skip(self))]
    pub async fn set_goal(&mut self, habit_id: &str, kind: GoalKind, target: f64) -> Result<()> {
        self.state.set_goal(habit_id, kind, target)?;
        self.commit(false).await
    }

    /// Removes a goal. Returns `true` if there was one.
    #[instrument(skip(self))]
    pub async fn remove_goal(&mut self, habit_id: &str, kind: GoalKind) -> Result<bool> {
        let removed = self.state.remove_goal(habit_id, kind)?;
        if removed {
            self.commit(false).await?;
        }
        Ok(removed)
    }

    /// Sets the manual monthly override of a habit's derived goal.
    #[instrument(skip(self))]
    pub async fn set_monthly_override(&mut self, habit_id: &str, value: f64) -> Result<()> {
        self.state.set_monthly_override(habit_id, value)?;
        self.commit(false).await
    }

    /// Derived breakdown of a habit's yearly goal, created and stored on first access.
    #[instrument(skip(self))]
    pub async fn derived_goal(&mut self, habit_id: &str) -> Result<Option<DerivedGoal>> {
        let Some((record, created)) = self.state.derived_goal(habit_id)? else {
            return Ok(None);
        };
        if created {
            self.commit(false).await?;
        }
        Ok(Some(record))
    }

    /// Insight rows for every yearly goal; missing derived records are created first.
    pub async fn goal_insights(&mut self, today: NaiveDate) -> Result<Vec<GoalInsight>> {
        if self.state.ensure_derived_goals() > 0 {
            self.commit(false).await?;
        }
        Ok(stats::goal_insights(&self.state, today))
    }

    // ----- reminders -----

    /// Changes a habit's reminder settings.
    #[instrument(skip(self))]
    pub async fn update_reminder(&mut self, habit_id: &str, update: &ReminderUpdate) -> Result<()> {
        self.state.update_reminder(habit_id, update)?;
        self.commit(true).await
    }

    /// Unions the slots the background worker delivered into the foreground ledger.
    /// A missing or unreadable worker record leaves nothing to merge.
    async fn absorb_worker_ledger(&mut self) -> usize {
        match store::load_json::<_, ReminderRecord>(&self.db, store::REMINDERS_KEY).await {
            Ok(Some(record)) => self.state.merge_sent_map(&record.sent_map),
            Ok(None) => 0,
            Err(e) => {
                debug!(error = %e, "Background reminder record not readable");
                0
            }
        }
    }

    /// Foreground due-check for the minute `now`.
    ///
    /// Merges the worker's delivered slots first, delivers through `sink`, records
    /// only delivered slots, prunes the ledger to the foreground water marks, then
    /// republishes. Safe to call any number of times in the same minute. Returns the
    /// delivered reminders.
    pub async fn check_due_reminders(
        &mut self,
        now: NaiveDateTime,
        sink: &dyn NotificationSink,
    ) -> Result<Vec<DueReminder>> {
        let merged = self.absorb_worker_ledger().await;
        let today = date_key::to_key(now.date());
        let items = self.state.reminder_items();
        let due = reminder::due_reminders(&items, now, self.state.sent_map(), |habit_id| {
            self.state.logs().is_done(habit_id, &today)
        });
        let delivered = notify::deliver_due(sink, due, &self.settings.app_url);

        for reminder in &delivered {
            self.state
                .record_delivery(&reminder.habit_id, reminder.slot.clone());
        }
        let marks = self.settings.reminders;
        let pruned = self
            .state
            .prune_sent_map(marks.foreground_high_water, marks.foreground_low_water);
        if pruned > 0 {
            debug!(pruned, "Pruned foreground reminder ledger");
        }

        if delivered.is_empty() && pruned == 0 && merged == 0 {
            self.publish_reminders();
        } else {
            self.commit(true).await?;
        }
        Ok(delivered)
    }

    // ----- import / export -----

    /// Full document as pretty JSON.
    pub fn export_json(&self) -> Result<String> {
        self.state.to_json_pretty()
    }

    /// Replaces the whole state with an imported document.
    ///
    /// # Errors
    /// [`Error::MalformedImport`] if the text is not JSON; the current state is kept.
    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub async fn import_json(&mut self, text: &str) -> Result<()> {
        let imported =
            AppState::from_json_str(text, &self.settings.state_defaults(), Utc::now())?;
        info!(
            habits = imported.habits().len(),
            categories = imported.categories().len(),
            "Imported habit state"
        );
        self.state = imported;
        self.commit(true).await
    }
}

/// True when `result` failed only because the change is not durable yet.
#[must_use]
pub fn is_unsaved<T>(result: &Result<T>) -> bool {
    result.as_ref().err().is_some_and(Error::is_persistence)
}
