//! Background reminder worker.
//!
//! Runs as its own task and shares no memory with the foreground. It only sees what
//! arrives over the channel and what it stored itself under `habit_reminders`. Each
//! wake loads the record, runs the shared due-check against the worker's own ledger,
//! and writes the record back.

use crate::{
    config::settings::ReminderSettings,
    core::{
        date_key,
        reminder::{self, DueReminder},
        store,
    },
    errors::{Error, Result},
    reminders::{
        notify::{self, NotificationSink},
        protocol::{ReminderPayload, ReminderRecord, SyncMessage},
    },
};
use chrono::{NaiveDateTime, Utc};
use sea_orm::DatabaseConnection;
use std::{fmt, sync::Arc};
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

/// What woke the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WakeReason {
    /// `CHECK_NOW` from the foreground
    CheckNow,
    /// The worker's own periodic timer
    Periodic,
    /// A platform-initiated wake after connectivity returns
    DeferredSync,
}

impl fmt::Display for WakeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CheckNow => "check-now",
            Self::Periodic => "periodic",
            Self::DeferredSync => "deferred-sync",
        })
    }
}

/// The background context.
pub struct BackgroundWorker {
    db: DatabaseConnection,
    settings: ReminderSettings,
    sink: Arc<dyn NotificationSink>,
}

impl fmt::Debug for BackgroundWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundWorker")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl BackgroundWorker {
    /// Builds a worker over the durable store.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        settings: ReminderSettings,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { db, settings, sink }
    }

    /// Last stored record, or an empty one before the first sync.
    ///
    /// An unreadable record is treated as missing; the next sync rewrites it.
    pub async fn load_record(&self) -> Result<ReminderRecord> {
        match store::load_json(&self.db, store::REMINDERS_KEY).await {
            Ok(record) => Ok(record.unwrap_or_else(|| ReminderRecord::empty(Utc::now()))),
            Err(Error::Serialization(e)) => {
                warn!(error = %e, "Stored reminder record is unreadable, starting empty");
                Ok(ReminderRecord::empty(Utc::now()))
            }
            Err(e) => Err(e),
        }
    }

    async fn save_record(&self, record: &ReminderRecord) -> Result<()> {
        store::store_json(&self.db, store::REMINDERS_KEY, record).await
    }

    /// Stores a synced payload, union-merging its ledger into the stored one.
    pub async fn absorb(&self, payload: ReminderPayload) -> Result<()> {
        let mut record = self.load_record().await?;
        record.absorb(payload, Utc::now());
        let pruned = record.sent_map.prune(
            self.settings.background_high_water,
            self.settings.background_low_water,
        );
        if pruned > 0 {
            debug!(pruned, "Pruned background reminder ledger");
        }
        self.save_record(&record).await
    }

    /// Runs one due-check cycle for the minute `now`. Returns the delivered reminders.
    ///
    /// The worker has no completion log; each synced item carries its habit's latest
    /// done day, and a habit done today is skipped.
    pub async fn wake(&self, reason: WakeReason, now: NaiveDateTime) -> Result<Vec<DueReminder>> {
        let mut record = self.load_record().await?;
        let today = date_key::to_key(now.date());
        let due = reminder::due_reminders(&record.reminders, now, &record.sent_map, |habit_id| {
            record
                .reminders
                .iter()
                .any(|r| r.habit_id == habit_id && r.is_done_on(&today))
        });
        debug!(%reason, due = due.len(), "Background reminder check");
        let delivered = notify::deliver_due(self.sink.as_ref(), due, &record.app_url);

        for reminder in &delivered {
            record
                .sent_map
                .record(reminder.slot.clone(), &reminder.habit_id);
        }
        let pruned = record.sent_map.prune(
            self.settings.background_high_water,
            self.settings.background_low_water,
        );
        if !delivered.is_empty() || pruned > 0 {
            record.updated_at = Utc::now();
            self.save_record(&record).await?;
        }
        Ok(delivered)
    }

    /// Applies one message from the foreground.
    pub async fn handle(&self, message: SyncMessage) -> Result<()> {
        match message {
            SyncMessage::SyncReminders(payload) => self.absorb(payload).await,
            SyncMessage::CheckNow => self
                .wake(WakeReason::CheckNow, date_key::local_now())
                .await
                .map(|_| ()),
        }
    }

    /// Main loop: periodic wakes plus channel messages, until the channel closes.
    pub async fn run(self, mut rx: mpsc::Receiver<SyncMessage>) {
        let mut ticker = tokio::time::interval(self.settings.worker_wake_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Background reminder worker started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.wake(WakeReason::Periodic, date_key::local_now()).await {
                        warn!(error = %e, "Periodic reminder check failed");
                    }
                }
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        break;
                    };
                    if let Err(e) = self.handle(msg).await {
                        warn!(error = %e, "Reminder sync message failed");
                    }
                }
            }
        }
        info!("Reminder channel closed, background worker stopping");
    }

    /// Spawns [`Self::run`] on the runtime.
    pub fn spawn(self, rx: mpsc::Receiver<SyncMessage>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }
}
