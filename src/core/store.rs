//! Durable document store over the `system_state` table.
//!
//! Each document is written whole, one row per key, so readers never observe a
//! partially applied mutation.

use crate::{
    entities::{SystemState, system_state},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};
use serde::{Serialize, de::DeserializeOwned};

/// Key of the application-state document.
pub const STATE_KEY: &str = "habit_tracker_state";

/// Older keys read when [`STATE_KEY`] is absent, newest first.
pub const LEGACY_STATE_KEYS: [&str; 2] = ["habit_tracker_state_v4", "habit_tracker_state_v3"];

/// Key of the background reminder record.
pub const REMINDERS_KEY: &str = "habit_reminders";

/// Reads the raw string stored under `key`.
///
/// # Returns
/// * `Ok(Some(value))` - The stored document
/// * `Ok(None)` - Nothing stored under the key yet
pub async fn load_raw<C>(db: &C, key: &str) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let row = SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?;
    Ok(row.map(|r| r.value))
}

/// Writes `value` under `key`, replacing any previous document.
pub async fn store_raw<C>(db: &C, key: &str, value: String) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?;

    if let Some(row) = existing {
        let mut active_model: system_state::ActiveModel = row.into();
        active_model.value = Set(value);
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let new_row = system_state::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
            updated_at: Set(now),
            ..Default::default()
        };
        new_row.insert(db).await?;
    }

    Ok(())
}

/// Reads and deserializes a typed document.
pub async fn load_json<C, T>(db: &C, key: &str) -> Result<Option<T>>
where
    C: ConnectionTrait,
    T: DeserializeOwned,
{
    load_raw(db, key)
        .await?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(Into::into)
}

/// Serializes and writes a typed document.
pub async fn store_json<C, T>(db: &C, key: &str, value: &T) -> Result<()>
where
    C: ConnectionTrait,
    T: Serialize + Sync,
{
    let raw = serde_json::to_string(value)?;
    store_raw(db, key, raw).await
}

/// Reads the application-state document, falling back to legacy keys.
///
/// Returns the raw text with the key it was found under.
pub async fn load_state_text<C>(db: &C) -> Result<Option<(&'static str, String)>>
where
    C: ConnectionTrait,
{
    for key in std::iter::once(STATE_KEY).chain(LEGACY_STATE_KEYS) {
        if let Some(raw) = load_raw(db, key).await? {
            return Ok(Some((key, raw)));
        }
    }
    Ok(None)
}
