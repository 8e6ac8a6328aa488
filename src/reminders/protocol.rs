//! Foreground -> background sync contract.
//!
//! The foreground publishes its reminder configuration and dedup ledger as a
//! `SYNC_REMINDERS` message followed by `CHECK_NOW`. Delivery is fire-and-forget:
//! a full or closed channel drops the message and the worker keeps running on its
//! last stored record.

use crate::{
    core::reminder::{ReminderItem, SentLedger},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Configuration snapshot carried by `SYNC_REMINDERS`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    /// Click target for notifications
    pub app_url: String,
    /// Every habit's reminder settings
    pub reminders: Vec<ReminderItem>,
    /// Foreground dedup ledger
    pub sent_map: SentLedger,
}

/// Messages sent from the foreground to the background worker. There is no reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncMessage {
    /// Replace the stored configuration
    SyncReminders(ReminderPayload),
    /// Run a due-check immediately
    CheckNow,
}

/// The record the background worker keeps in the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRecord {
    /// Click target for notifications
    #[serde(default)]
    pub app_url: String,
    /// Last published reminder settings
    #[serde(default)]
    pub reminders: Vec<ReminderItem>,
    /// Background dedup ledger
    #[serde(default)]
    pub sent_map: SentLedger,
    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl ReminderRecord {
    /// Empty record used before the first sync arrives.
    #[must_use]
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            app_url: String::new(),
            reminders: Vec::new(),
            sent_map: SentLedger::new(),
            updated_at: now,
        }
    }

    /// Takes a new payload.
    ///
    /// Configuration is replaced outright; the ledger is the union of the stored and
    /// incoming ledgers so neither side forgets a delivery the other recorded.
    pub fn absorb(&mut self, payload: ReminderPayload, now: DateTime<Utc>) {
        self.app_url = payload.app_url;
        self.reminders = payload.reminders;
        self.sent_map.merge(&payload.sent_map);
        self.updated_at = now;
    }
}

/// Foreground handle on the background worker's channel.
#[derive(Debug, Clone)]
pub struct ReminderLink {
    tx: mpsc::Sender<SyncMessage>,
}

impl ReminderLink {
    /// Wraps the sending half of the worker channel.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<SyncMessage>) -> Self {
        Self { tx }
    }

    /// Creates a linked channel pair.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SyncMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends one message without waiting.
    ///
    /// # Errors
    /// [`Error::SyncUnreachable`] when the worker has stopped or its queue is full.
    pub fn send(&self, message: SyncMessage) -> Result<()> {
        self.tx.try_send(message).map_err(|e| {
            debug!(error = %e, "Reminder sync message not delivered");
            Error::SyncUnreachable
        })
    }

    /// Publishes a payload and asks the worker to check immediately.
    pub fn publish(&self, payload: ReminderPayload) -> Result<()> {
        self.send(SyncMessage::SyncReminders(payload))?;
        self.send(SyncMessage::CheckNow)
    }

    /// True once the worker side has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
