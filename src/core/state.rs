//! Application state document.
//!
//! `AppState` is the single JSON document persisted after every mutation and
//! round-tripped by import/export. Untrusted input goes through
//! [`AppState::from_value`], which produces a fully typed, fully defaulted value:
//! each top-level field that is structurally wrong falls back to its default instead
//! of failing the whole document.
//!
//! The mutation methods here are crate-private; callers go through
//! [`crate::core::service::HabitService`], which pairs every mutation with a flush.

use crate::{
    core::{
        date_key,
        goals::{DerivedGoal, DerivedGoals, GoalKind, Goals, validate_target},
        habit::{
            self, Frequency, Habit, HabitEdit, find_category, is_duplicate_habit, normalize_text,
            validate_name,
        },
        log_store::{LogStore, StatusUpdate},
        reminder::{ReminderConfig, ReminderItem, ReminderUpdate, SentLedger},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Reminder bookkeeping persisted with the state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderMeta {
    /// Dedup ledger of delivered slots
    pub sent_map: SentLedger,
}

/// Values used when the stored document is missing or lacks categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDefaults {
    /// Categories of a fresh document
    pub categories: Vec<String>,
    /// Category reinstated when the last one is deleted
    pub fallback_category: String,
}

impl Default for StateDefaults {
    fn default() -> Self {
        Self {
            categories: vec![
                "Walking".to_string(),
                "Meditation".to_string(),
                "Study".to_string(),
            ],
            fallback_category: "General".to_string(),
        }
    }
}

/// The whole persisted document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub(crate) categories: Vec<String>,
    pub(crate) habits: Vec<Habit>,
    pub(crate) logs: LogStore,
    pub(crate) goals: Goals,
    pub(crate) derived_goals: DerivedGoals,
    pub(crate) reminder_meta: ReminderMeta,
}

impl AppState {
    /// Fresh document with the default categories and nothing else.
    #[must_use]
    pub fn new(defaults: &StateDefaults) -> Self {
        Self {
            categories: base_categories(defaults),
            habits: Vec::new(),
            logs: LogStore::new(),
            goals: Goals::default(),
            derived_goals: DerivedGoals::default(),
            reminder_meta: ReminderMeta::default(),
        }
    }

    /// Parses and normalises JSON text.
    ///
    /// # Errors
    /// Only [`Error::MalformedImport`] when the text is not JSON at all.
    pub fn from_json_str(text: &str, defaults: &StateDefaults, now: DateTime<Utc>) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| Error::MalformedImport {
            message: e.to_string(),
        })?;
        Ok(Self::from_value(&value, defaults, now))
    }

    /// Normalises an arbitrary JSON value into a valid document.
    #[must_use]
    pub fn from_value(value: &Value, defaults: &StateDefaults, now: DateTime<Utc>) -> Self {
        if !value.is_object() {
            warn!("State document is not an object, using defaults");
        }
        let categories = normalize_categories(value.get("categories"), defaults);
        let habits = normalize_habits(value.get("habits"), &categories, now);
        let empty = Value::Null;
        Self {
            categories,
            habits,
            logs: LogStore::from_value(value.get("logs").unwrap_or(&empty)),
            goals: Goals::from_value(value.get("goals").unwrap_or(&empty)),
            derived_goals: DerivedGoals::from_value(value.get("derivedGoals").unwrap_or(&empty)),
            reminder_meta: ReminderMeta {
                sent_map: SentLedger::from_value(
                    value.get("reminderMeta").and_then(|meta| meta.get("sentMap")),
                ),
            },
        }
    }

    /// Pretty JSON for export.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Compact JSON for persistence.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }

    /// Category names in display order.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// All habits in creation order.
    #[must_use]
    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    /// Completion log.
    #[must_use]
    pub const fn logs(&self) -> &LogStore {
        &self.logs
    }

    /// Monthly and yearly targets.
    #[must_use]
    pub const fn goals(&self) -> &Goals {
        &self.goals
    }

    /// Derived goal breakdowns.
    #[must_use]
    pub const fn derived_goals(&self) -> &DerivedGoals {
        &self.derived_goals
    }

    /// Foreground dedup ledger.
    #[must_use]
    pub const fn sent_map(&self) -> &SentLedger {
        &self.reminder_meta.sent_map
    }

    /// Looks a habit up by id.
    #[must_use]
    pub fn habit(&self, habit_id: &str) -> Option<&Habit> {
        self.habits.iter().find(|h| h.id == habit_id)
    }

    /// Habits filed under `category` (case-insensitive).
    #[must_use]
    pub fn habits_in_category(&self, category: &str) -> Vec<&Habit> {
        let wanted = habit::fold_name(category);
        self.habits
            .iter()
            .filter(|h| habit::fold_name(&h.category) == wanted)
            .collect()
    }

    /// Reminder snapshot of every habit, for publishing to the background context.
    ///
    /// Each item carries the habit's latest completed day so the background check can
    /// skip habits already done without reading the log.
    #[must_use]
    pub fn reminder_items(&self) -> Vec<ReminderItem> {
        self.habits
            .iter()
            .map(|h| ReminderItem {
                last_done_on: self.logs.last_done(&h.id).map(str::to_string),
                ..ReminderItem::from_habit(h)
            })
            .collect()
    }

    fn habit_mut(&mut self, habit_id: &str) -> Result<&mut Habit> {
        self.habits
            .iter_mut()
            .find(|h| h.id == habit_id)
            .ok_or_else(|| Error::HabitNotFound {
                id: habit_id.to_string(),
            })
    }

    fn require_habit(&self, habit_id: &str) -> Result<&Habit> {
        self.habit(habit_id).ok_or_else(|| Error::HabitNotFound {
            id: habit_id.to_string(),
        })
    }

    // ----- categories -----

    pub(crate) fn add_category(&mut self, name: &str) -> Result<String> {
        let name = validate_name(name, "Category")?;
        if find_category(&self.categories, &name).is_some() {
            return Err(Error::validation("Category already exists."));
        }
        self.categories.push(name.clone());
        Ok(name)
    }

    /// Removes the category and every habit in it. Returns the removed habit ids.
    pub(crate) fn delete_category(
        &mut self,
        name: &str,
        fallback_category: &str,
    ) -> Result<Vec<String>> {
        let category = find_category(&self.categories, name)
            .cloned()
            .ok_or_else(|| Error::CategoryNotFound {
                name: name.to_string(),
            })?;

        let doomed: Vec<String> = self
            .habits
            .iter()
            .filter(|h| h.category == category)
            .map(|h| h.id.clone())
            .collect();
        for id in &doomed {
            self.remove_habit_cascade(id);
        }

        self.categories.retain(|c| c != &category);
        if self.categories.is_empty() {
            self.categories.push(fallback_category.to_string());
        }
        Ok(doomed)
    }

    // ----- habits -----

    pub(crate) fn add_habit(
        &mut self,
        name: &str,
        category: &str,
        frequency: Frequency,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let name = validate_name(name, "Habit")?;
        let category = find_category(&self.categories, category)
            .cloned()
            .ok_or_else(|| Error::validation("Please select a valid category."))?;
        if is_duplicate_habit(&self.habits, &category, &name, None) {
            return Err(Error::validation("Habit already exists in selected category."));
        }
        let habit = Habit::new(name, category, frequency, now);
        let id = habit.id.clone();
        self.habits.push(habit);
        Ok(id)
    }

    pub(crate) fn edit_habit(&mut self, habit_id: &str, edit: &HabitEdit) -> Result<()> {
        let current = self.require_habit(habit_id)?;
        let name = edit
            .name
            .as_deref()
            .map(|n| validate_name(n, "Habit"))
            .transpose()?
            .unwrap_or_else(|| current.name.clone());
        let category = match edit.category.as_deref() {
            Some(c) => find_category(&self.categories, c)
                .cloned()
                .ok_or_else(|| Error::validation("Please select a valid category."))?,
            None => current.category.clone(),
        };
        let anchor_day = edit
            .anchor_day
            .map(|d| habit::validate_weekday(i64::from(d)))
            .transpose()?;
        if is_duplicate_habit(&self.habits, &category, &name, Some(habit_id)) {
            return Err(Error::validation("Habit already exists in selected category."));
        }

        let habit = self.habit_mut(habit_id)?;
        habit.name = name;
        habit.category = category;
        if let Some(frequency) = edit.frequency {
            habit.frequency = frequency;
            habit.reminder.frequency = frequency;
        }
        if let Some(day) = anchor_day {
            habit.anchor_day = Some(day);
            habit.reminder.day = day;
        }
        Ok(())
    }

    pub(crate) fn delete_habit(&mut self, habit_id: &str) -> Result<Habit> {
        self.require_habit(habit_id)?;
        self.remove_habit_cascade(habit_id)
            .ok_or_else(|| Error::HabitNotFound {
                id: habit_id.to_string(),
            })
    }

    fn remove_habit_cascade(&mut self, habit_id: &str) -> Option<Habit> {
        let index = self.habits.iter().position(|h| h.id == habit_id)?;
        let habit = self.habits.remove(index);
        let log_entries = self.logs.prune_habit(habit_id);
        self.goals.remove_habit(habit_id);
        self.derived_goals.remove(habit_id);
        let slots = self.reminder_meta.sent_map.remove_habit(habit_id);
        debug!(habit_id, log_entries, slots, "Removed habit and dependent records");
        Some(habit)
    }

    // ----- log -----

    pub(crate) fn set_status(
        &mut self,
        habit_id: &str,
        date_key: &str,
        update: StatusUpdate,
    ) -> Result<bool> {
        self.require_habit(habit_id)?;
        if date_key::parse_key(date_key).is_none() {
            return Err(Error::validation(format!(
                "Date must be YYYY-MM-DD, got {date_key:?}"
            )));
        }
        Ok(self.logs.set_status(habit_id, date_key, update))
    }

    pub(crate) fn ensure_day(&mut self, date_key: &str) -> bool {
        self.logs.ensure_day(date_key)
    }

    // ----- goals -----

    pub(crate) fn set_goal(&mut self, habit_id: &str, kind: GoalKind, target: f64) -> Result<()> {
        self.require_habit(habit_id)?;
        let target = validate_target(target)?;
        self.goals.table_mut(kind).insert(habit_id.to_string(), target);
        match kind {
            GoalKind::Yearly => {
                self.derived_goals.apply_yearly(habit_id, target);
            }
            GoalKind::Monthly => self.derived_goals.apply_monthly(habit_id, target),
        }
        Ok(())
    }

    pub(crate) fn remove_goal(&mut self, habit_id: &str, kind: GoalKind) -> Result<bool> {
        self.require_habit(habit_id)?;
        let removed = self.goals.table_mut(kind).remove(habit_id).is_some();
        if removed && kind == GoalKind::Yearly {
            self.derived_goals.remove(habit_id);
        }
        Ok(removed)
    }

    pub(crate) fn set_monthly_override(&mut self, habit_id: &str, value: f64) -> Result<()> {
        self.require_habit(habit_id)?;
        let value = validate_target(value)?;
        let yearly = self.goals.yearly.get(habit_id).copied();
        self.derived_goals.set_override(habit_id, value, yearly);
        Ok(())
    }

    /// Creates missing derived records for every yearly goal. Returns how many were created.
    pub(crate) fn ensure_derived_goals(&mut self) -> usize {
        let yearly: Vec<(String, f64)> = self
            .goals
            .yearly
            .iter()
            .filter(|(id, _)| self.habit(id).is_some())
            .map(|(id, t)| (id.clone(), *t))
            .collect();
        yearly
            .into_iter()
            .filter(|(id, target)| self.derived_goals.get_or_derive(id, *target).1)
            .count()
    }

    /// Derived record for a habit's yearly goal, created on first access.
    pub(crate) fn derived_goal(&mut self, habit_id: &str) -> Result<Option<(DerivedGoal, bool)>> {
        self.require_habit(habit_id)?;
        let Some(target) = self.goals.yearly.get(habit_id).copied() else {
            return Ok(self.derived_goals.get(habit_id).cloned().map(|d| (d, false)));
        };
        let (record, created) = self.derived_goals.get_or_derive(habit_id, target);
        Ok(Some((record.clone(), created)))
    }

    // ----- reminders -----

    pub(crate) fn update_reminder(&mut self, habit_id: &str, update: &ReminderUpdate) -> Result<()> {
        let habit = self.habit_mut(habit_id)?;
        update.apply_to(&mut habit.reminder)
    }

    pub(crate) fn record_delivery(&mut self, habit_id: &str, slot: String) {
        if let Some(habit) = self.habits.iter_mut().find(|h| h.id == habit_id) {
            habit.reminder.last_notified_slot.clone_from(&slot);
        }
        self.reminder_meta.sent_map.record(slot, habit_id);
    }

    /// Unions another copy of the ledger into ours. Returns how many slots were new.
    pub(crate) fn merge_sent_map(&mut self, other: &SentLedger) -> usize {
        self.reminder_meta.sent_map.merge(other)
    }

    pub(crate) fn prune_sent_map(&mut self, high_water: usize, low_water: usize) -> usize {
        self.reminder_meta.sent_map.prune(high_water, low_water)
    }
}

fn base_categories(defaults: &StateDefaults) -> Vec<String> {
    let mut seen = HashSet::new();
    let categories: Vec<String> = defaults
        .categories
        .iter()
        .map(|c| normalize_text(c))
        .filter(|c| !c.is_empty() && seen.insert(habit::fold_name(c)))
        .collect();
    if categories.is_empty() {
        vec![defaults.fallback_category.clone()]
    } else {
        categories
    }
}

fn normalize_categories(raw: Option<&Value>, defaults: &StateDefaults) -> Vec<String> {
    let Some(items) = raw.and_then(Value::as_array) else {
        return base_categories(defaults);
    };
    let mut seen = HashSet::new();
    let categories: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(normalize_text)
        .filter(|c| !c.is_empty() && seen.insert(habit::fold_name(c)))
        .collect();
    if categories.is_empty() {
        base_categories(defaults)
    } else {
        categories
    }
}

fn normalize_habits(raw: Option<&Value>, categories: &[String], now: DateTime<Utc>) -> Vec<Habit> {
    let Some(items) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut seen_names = HashSet::new();
    let mut seen_ids = HashSet::new();
    let mut habits = Vec::new();
    for item in items.iter().filter(|v| v.is_object()) {
        let Some(habit) = normalize_habit(item, categories, now) else {
            continue;
        };
        let name_key = format!(
            "{}::{}",
            habit::fold_name(&habit.category),
            habit::fold_name(&habit.name)
        );
        if !seen_ids.insert(habit.id.clone()) || !seen_names.insert(name_key) {
            debug!(habit_id = %habit.id, "Dropping duplicate habit during normalization");
            continue;
        }
        habits.push(habit);
    }
    habits
}

fn normalize_habit(raw: &Value, categories: &[String], now: DateTime<Utc>) -> Option<Habit> {
    let name = normalize_text(raw.get("name").and_then(Value::as_str).unwrap_or_default());
    if name.is_empty() {
        return None;
    }
    let created_at = raw
        .get("createdAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or(now, |dt| dt.with_timezone(&Utc));
    let frequency = Frequency::from_lenient(
        raw.get("frequency")
            .and_then(Value::as_str)
            .unwrap_or_default(),
    );
    let id = match raw.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => habit::generate_habit_id(now),
    };
    let category = raw
        .get("category")
        .and_then(Value::as_str)
        .and_then(|c| find_category(categories, c))
        .or_else(|| categories.first())?
        .clone();
    let anchor_day = raw
        .get("anchorDay")
        .and_then(Value::as_u64)
        .and_then(|d| u8::try_from(d).ok())
        .filter(|d| *d <= 6);
    let created_weekday = date_key::weekday_index(created_at.with_timezone(&Local).date_naive());

    Some(Habit {
        id,
        name,
        category,
        frequency,
        created_at,
        anchor_day,
        reminder: ReminderConfig::from_value(raw.get("reminder"), frequency, created_weekday),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::log_store::DayStatus;
    use crate::test_utils::local_utc;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        local_utc(2026, 10, 16, 9, 0)
    }

    fn state() -> AppState {
        AppState::new(&StateDefaults::default())
    }

    #[test]
    fn test_fresh_state_has_default_categories() {
        let s = state();
        assert_eq!(s.categories(), ["Walking", "Meditation", "Study"]);
        assert!(s.habits().is_empty());
    }

    #[test]
    fn test_add_category_rejects_duplicates_case_insensitively() {
        let mut s = state();
        assert_eq!(s.add_category("  Music  practice ").unwrap(), "Music practice");
        assert!(matches!(s.add_category("walking"), Err(Error::Validation { .. })));
        assert!(matches!(s.add_category("   "), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_category_names_fold_beyond_ascii() {
        let mut s = state();
        s.add_category("été").unwrap();
        assert!(matches!(s.add_category("ÉTÉ"), Err(Error::Validation { .. })));
        let id = s.add_habit("Swim", "Été", Frequency::Daily, now()).unwrap();
        assert_eq!(s.habit(&id).unwrap().category, "été");
        assert_eq!(s.habits_in_category("ÉTÉ").len(), 1);
        assert!(s.add_habit("SWIM", "été", Frequency::Daily, now()).is_err());

        let imported = AppState::from_value(
            &json!({ "categories": ["été", "ÉTÉ", "Winter"] }),
            &StateDefaults::default(),
            now(),
        );
        assert_eq!(imported.categories(), ["été", "Winter"]);
    }

    #[test]
    fn test_reminder_items_carry_latest_done_day() {
        let mut s = state();
        let id = s.add_habit("Read", "Study", Frequency::Daily, now()).unwrap();
        assert_eq!(s.reminder_items()[0].last_done_on, None);
        s.set_status(&id, "2026-10-15", StatusUpdate::Done).unwrap();
        s.set_status(&id, "2026-10-16", StatusUpdate::Skip).unwrap();
        let items = s.reminder_items();
        assert!(items[0].is_done_on("2026-10-15"));
        assert!(!items[0].is_done_on("2026-10-16"));
    }

    #[test]
    fn test_add_habit_validation() {
        let mut s = state();
        assert!(s.add_habit("", "Study", Frequency::Daily, now()).is_err());
        assert!(s.add_habit("Read", "Cooking", Frequency::Daily, now()).is_err());
        let id = s.add_habit("Read", "study", Frequency::Daily, now()).unwrap();
        assert_eq!(s.habit(&id).unwrap().category, "Study");
        assert!(s.add_habit("READ", "Study", Frequency::Weekly, now()).is_err());
        // Same name in another category is fine
        assert!(s.add_habit("Read", "Walking", Frequency::Daily, now()).is_ok());
    }

    #[test]
    fn test_delete_habit_cascades() {
        let mut s = state();
        let id = s.add_habit("Read", "Study", Frequency::Daily, now()).unwrap();
        let other = s.add_habit("Walk", "Walking", Frequency::Daily, now()).unwrap();
        s.set_status(&id, "2026-10-15", StatusUpdate::Done).unwrap();
        s.set_status(&other, "2026-10-15", StatusUpdate::Done).unwrap();
        s.set_goal(&id, GoalKind::Yearly, 120.0).unwrap();
        s.set_goal(&id, GoalKind::Monthly, 10.0).unwrap();
        s.record_delivery(&id, format!("{id}::2026-10-15::08:00"));
        s.record_delivery(&other, format!("{other}::2026-10-15::08:00"));

        s.delete_habit(&id).unwrap();
        assert!(s.habit(&id).is_none());
        assert_eq!(s.logs().get_status(&id, "2026-10-15"), DayStatus::Pending);
        assert_eq!(s.logs().get_status(&other, "2026-10-15"), DayStatus::Done);
        assert!(s.goals().monthly.is_empty() && s.goals().yearly.is_empty());
        assert!(s.derived_goals().get(&id).is_none());
        assert_eq!(s.sent_map().len(), 1);
        assert!(matches!(s.delete_habit(&id), Err(Error::HabitNotFound { .. })));
    }

    #[test]
    fn test_delete_last_category_reinstates_fallback() {
        let mut s = state();
        let id = s.add_habit("Walk", "Walking", Frequency::Daily, now()).unwrap();
        assert_eq!(s.delete_category("walking", "General").unwrap(), vec![id]);
        s.delete_category("Meditation", "General").unwrap();
        s.delete_category("Study", "General").unwrap();
        assert_eq!(s.categories(), ["General"]);
        assert!(s.habits().is_empty());
        assert!(matches!(
            s.delete_category("Nope", "General"),
            Err(Error::CategoryNotFound { .. })
        ));
    }

    #[test]
    fn test_edit_habit_keeps_anchor_when_frequency_changes() {
        let mut s = state();
        let id = s.add_habit("Read", "Study", Frequency::Daily, now()).unwrap();
        let anchor = s.habit(&id).unwrap().anchor_weekday();
        s.edit_habit(
            &id,
            &HabitEdit {
                frequency: Some(Frequency::Weekly),
                ..HabitEdit::default()
            },
        )
        .unwrap();
        let habit = s.habit(&id).unwrap();
        assert_eq!(habit.frequency, Frequency::Weekly);
        assert_eq!(habit.reminder.frequency, Frequency::Weekly);
        assert_eq!(habit.anchor_weekday(), anchor);

        s.edit_habit(
            &id,
            &HabitEdit {
                anchor_day: Some(3),
                ..HabitEdit::default()
            },
        )
        .unwrap();
        assert_eq!(s.habit(&id).unwrap().anchor_weekday(), 3);
        assert_eq!(s.habit(&id).unwrap().reminder.day, 3);
        assert!(
            s.edit_habit(
                &id,
                &HabitEdit {
                    anchor_day: Some(7),
                    ..HabitEdit::default()
                }
            )
            .is_err()
        );
    }

    #[test]
    fn test_set_status_validates_inputs() {
        let mut s = state();
        let id = s.add_habit("Read", "Study", Frequency::Daily, now()).unwrap();
        assert!(matches!(
            s.set_status("ghost", "2026-10-16", StatusUpdate::Done),
            Err(Error::HabitNotFound { .. })
        ));
        assert!(matches!(
            s.set_status(&id, "16/10/2026", StatusUpdate::Done),
            Err(Error::Validation { .. })
        ));
        assert!(s.logs().is_empty());
    }

    #[test]
    fn test_goal_validation_leaves_state_untouched() {
        let mut s = state();
        let id = s.add_habit("Read", "Study", Frequency::Daily, now()).unwrap();
        let before = s.clone();
        assert!(matches!(
            s.set_goal(&id, GoalKind::Yearly, 0.0),
            Err(Error::InvalidTarget { .. })
        ));
        assert!(s.set_monthly_override(&id, -2.0).is_err());
        assert_eq!(s, before);
    }

    #[test]
    fn test_override_without_record_uses_yearly_goal() {
        let mut s = state();
        let id = s.add_habit("Read", "Study", Frequency::Daily, now()).unwrap();
        s.goals.yearly.insert(id.clone(), 120.0);
        s.set_monthly_override(&id, 15.0).unwrap();
        let record = s.derived_goals().get(&id).unwrap();
        assert_eq!(record.from_yearly, Some(120.0));
        assert_eq!(record.monthly_target, 10);
        assert_eq!(record.manual_monthly_override, Some(15.0));
    }

    #[test]
    fn test_ensure_derived_goals_is_lazy() {
        let mut s = state();
        let id = s.add_habit("Read", "Study", Frequency::Daily, now()).unwrap();
        s.goals.yearly.insert(id.clone(), 365.0);
        s.goals.yearly.insert("ghost".to_string(), 10.0);
        assert_eq!(s.ensure_derived_goals(), 1);
        assert_eq!(s.ensure_derived_goals(), 0);
        assert_eq!(s.derived_goals().len(), 1);
    }

    #[test]
    fn test_normalization_repairs_document() {
        let raw = json!({
            "categories": ["Study", "study", " ", 7, "Fitness"],
            "habits": [
                { "id": "h1", "name": " Read ", "category": "Study", "frequency": "weekly",
                  "createdAt": "2026-10-12T08:00:00.000Z",
                  "reminder": { "enabled": true, "time": "25:00", "day": 9 } },
                { "id": "h2", "name": "read", "category": "study", "frequency": "daily" },
                { "id": "h3", "name": "", "category": "Study" },
                { "name": "Lift", "category": "Unknown", "frequency": "hourly" },
                "not a habit"
            ],
            "logs": { "2026-10-15": { "h1": "done", "h9": "bogus" } },
            "goals": { "monthly": [], "yearly": { "h1": 52 } },
            "derivedGoals": 5,
            "reminderMeta": { "sentMap": { "h1::2026-10-15::08:00": "h1" } }
        });
        let s = AppState::from_value(&raw, &StateDefaults::default(), now());
        assert_eq!(s.categories(), ["Study", "Fitness"]);
        assert_eq!(s.habits().len(), 2);
        let read = s.habit("h1").unwrap();
        assert_eq!(read.name, "Read");
        assert_eq!(read.frequency, Frequency::Weekly);
        assert!(read.reminder.enabled);
        assert_eq!(read.reminder.time, "08:00");
        assert_eq!(read.reminder.day, read.created_weekday());
        let lift = s.habits().iter().find(|h| h.name == "Lift").unwrap();
        assert_eq!(lift.category, "Study");
        assert_eq!(lift.frequency, Frequency::Daily);
        assert!(lift.id.starts_with("habit_"));
        assert_eq!(s.logs().len(), 1);
        assert!(s.goals().monthly.is_empty());
        assert_eq!(s.goals().yearly.get("h1"), Some(&52.0));
        assert!(s.derived_goals().is_empty());
        assert_eq!(s.sent_map().len(), 1);
    }

    #[test]
    fn test_unparseable_import_is_rejected() {
        let err = AppState::from_json_str("{ nope", &StateDefaults::default(), now()).unwrap_err();
        assert!(matches!(err, Error::MalformedImport { .. }));
        // Valid JSON of the wrong shape is normalised, not rejected
        let s = AppState::from_json_str("[1, 2, 3]", &StateDefaults::default(), now()).unwrap();
        assert_eq!(s, state());
    }

    #[test]
    fn test_export_round_trips() {
        let mut s = state();
        let id = s.add_habit("Read", "Study", Frequency::Weekly, now()).unwrap();
        s.set_status(&id, "2026-10-16", StatusUpdate::Skip).unwrap();
        s.set_goal(&id, GoalKind::Yearly, 120.0).unwrap();
        s.set_monthly_override(&id, 15.0).unwrap();
        s.update_reminder(
            &id,
            &ReminderUpdate {
                enabled: Some(true),
                time: Some("06:45".to_string()),
                day: Some(2),
            },
        )
        .unwrap();
        let text = s.to_json_pretty().unwrap();
        let back = AppState::from_json_str(&text, &StateDefaults::default(), now()).unwrap();
        assert_eq!(back, s);
    }
}
