//! Goal derivation - yearly targets broken down into monthly and daily pace.
//!
//! Derived records are created once and only recomputed when the yearly goal itself
//! changes. A manual monthly override replaces the monthly comparison basis but never
//! touches the daily pace, which stays tied to the yearly value.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Average days per month used for monthly-only pace suggestions.
const DAYS_PER_MONTH: f64 = 30.0;

/// Which goal table a target lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    /// Target count of done days in the current month
    Monthly,
    /// Target count of done days in the current year
    Yearly,
}

impl FromStr for GoalKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(Error::validation(format!("Invalid goal type: {other}"))),
        }
    }
}

impl fmt::Display for GoalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        })
    }
}

/// Per-habit numeric targets. A habit may have both, either, or neither.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Goals {
    /// habit id -> monthly target
    pub monthly: BTreeMap<String, f64>,
    /// habit id -> yearly target
    pub yearly: BTreeMap<String, f64>,
}

impl Goals {
    /// The table for `kind`.
    #[must_use]
    pub const fn table(&self, kind: GoalKind) -> &BTreeMap<String, f64> {
        match kind {
            GoalKind::Monthly => &self.monthly,
            GoalKind::Yearly => &self.yearly,
        }
    }

    /// Mutable table for `kind`.
    pub fn table_mut(&mut self, kind: GoalKind) -> &mut BTreeMap<String, f64> {
        match kind {
            GoalKind::Monthly => &mut self.monthly,
            GoalKind::Yearly => &mut self.yearly,
        }
    }

    /// Drops both goals of a habit.
    pub fn remove_habit(&mut self, habit_id: &str) {
        self.monthly.remove(habit_id);
        self.yearly.remove(habit_id);
    }

    /// Builds goal tables from untrusted JSON, keeping only positive finite targets.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self {
            monthly: targets_from_value(value.get("monthly")),
            yearly: targets_from_value(value.get("yearly")),
        }
    }
}

fn targets_from_value(value: Option<&Value>) -> BTreeMap<String, f64> {
    value
        .and_then(Value::as_object)
        .map(|table| {
            table
                .iter()
                .filter_map(|(id, target)| {
                    target
                        .as_f64()
                        .filter(|t| t.is_finite() && *t > 0.0)
                        .map(|t| (id.clone(), t))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Rejects non-finite or non-positive targets.
pub fn validate_target(target: f64) -> Result<f64> {
    if !target.is_finite() || target <= 0.0 {
        return Err(Error::InvalidTarget { target });
    }
    Ok(target)
}

/// Raw output of [`derive_from_yearly`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivation {
    /// `max(1, round(target / 12))`
    pub monthly_target: u32,
    /// `target / 365`
    pub daily_raw: f64,
    /// `max(1, round(daily_raw))`
    pub daily_suggested: u32,
}

/// Breaks a yearly target into monthly and daily suggestions.
#[must_use]
pub fn derive_from_yearly(target: f64) -> Derivation {
    let daily_raw = target / 365.0;
    Derivation {
        monthly_target: at_least_one(target / 12.0),
        daily_raw,
        daily_suggested: at_least_one(daily_raw),
    }
}

fn at_least_one(value: f64) -> u32 {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < 1.0 {
        return 1;
    }
    if rounded >= f64::from(u32::MAX) {
        return u32::MAX;
    }
    // Bounded to [1, u32::MAX) above
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let out = rounded as u32;
    out
}

/// Stored breakdown for one habit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedGoal {
    /// Yearly target this record was computed from, if any
    pub from_yearly: Option<f64>,
    /// Suggested monthly target (>= 1)
    pub monthly_target: u32,
    /// Unrounded daily pace
    pub daily_raw: f64,
    /// Suggested daily target (>= 1)
    pub daily_suggested: u32,
    /// User-set monthly target that wins over `monthly_target`
    pub manual_monthly_override: Option<f64>,
}

impl DerivedGoal {
    /// Fresh record for a yearly target, without override.
    #[must_use]
    pub fn from_yearly(target: f64) -> Self {
        let derived = derive_from_yearly(target);
        Self {
            from_yearly: Some(target),
            monthly_target: derived.monthly_target,
            daily_raw: derived.daily_raw,
            daily_suggested: derived.daily_suggested,
            manual_monthly_override: None,
        }
    }

    /// Record seeded from a monthly goal when no yearly goal exists.
    #[must_use]
    pub fn from_monthly(target: f64) -> Self {
        let daily_raw = target / DAYS_PER_MONTH;
        Self {
            from_yearly: None,
            monthly_target: at_least_one(target),
            daily_raw,
            daily_suggested: at_least_one(daily_raw),
            manual_monthly_override: None,
        }
    }

    /// Monthly target used for display and achievement comparisons.
    #[must_use]
    pub fn effective_monthly(&self) -> f64 {
        self.manual_monthly_override
            .unwrap_or_else(|| f64::from(self.monthly_target))
    }

    fn from_value(value: &Value) -> Option<Self> {
        let number = |field: &str| value.get(field).and_then(Value::as_f64);
        let positive = |field: &str| number(field).filter(|v| v.is_finite() && *v > 0.0);

        let from_yearly = positive("fromYearly");
        let monthly_target = positive("monthlyTarget")
            .map(at_least_one)
            .or_else(|| from_yearly.map(|y| derive_from_yearly(y).monthly_target))?;
        let daily_raw = number("dailyRaw")
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or_else(|| from_yearly.map_or(0.0, |y| y / 365.0));
        let daily_suggested =
            positive("dailySuggested").map_or_else(|| at_least_one(daily_raw), at_least_one);
        Some(Self {
            from_yearly,
            monthly_target,
            daily_raw,
            daily_suggested,
            manual_monthly_override: positive("manualMonthlyOverride"),
        })
    }
}

/// habit id -> derived breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivedGoals {
    records: BTreeMap<String, DerivedGoal>,
}

impl DerivedGoals {
    /// Record for a habit, if one was created.
    #[must_use]
    pub fn get(&self, habit_id: &str) -> Option<&DerivedGoal> {
        self.records.get(habit_id)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no records exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Recomputes the record for a new yearly value, keeping an existing override.
    pub fn apply_yearly(&mut self, habit_id: &str, target: f64) -> &DerivedGoal {
        let previous_override = self
            .records
            .get(habit_id)
            .and_then(|d| d.manual_monthly_override);
        let mut record = DerivedGoal::from_yearly(target);
        record.manual_monthly_override = previous_override;
        self.records.insert(habit_id.to_string(), record);
        &self.records[habit_id]
    }

    /// Seeds a record from a monthly goal if none exists yet.
    pub fn apply_monthly(&mut self, habit_id: &str, target: f64) {
        self.records
            .entry(habit_id.to_string())
            .or_insert_with(|| DerivedGoal::from_monthly(target));
    }

    /// Returns the record, creating it from `yearly_target` on first access.
    /// The second element is `true` when a record was created.
    pub fn get_or_derive(&mut self, habit_id: &str, yearly_target: f64) -> (&DerivedGoal, bool) {
        let mut created = false;
        let record = self
            .records
            .entry(habit_id.to_string())
            .or_insert_with(|| {
                created = true;
                DerivedGoal::from_yearly(yearly_target)
            });
        (record, created)
    }

    /// Sets the manual monthly override.
    ///
    /// An existing record only has its override replaced. A missing record is created
    /// from `yearly_target` when there is one, otherwise seeded from the override value.
    pub fn set_override(&mut self, habit_id: &str, value: f64, yearly_target: Option<f64>) {
        let record = self.records.entry(habit_id.to_string()).or_insert_with(|| {
            yearly_target.map_or_else(|| DerivedGoal::from_monthly(value), DerivedGoal::from_yearly)
        });
        record.manual_monthly_override = Some(value);
    }

    /// Override if set, else the derived monthly target, else `fallback`.
    #[must_use]
    pub fn effective_monthly_target(&self, habit_id: &str, fallback: f64) -> f64 {
        self.records
            .get(habit_id)
            .map_or(fallback, DerivedGoal::effective_monthly)
    }

    /// Drops the record of a habit.
    pub fn remove(&mut self, habit_id: &str) -> bool {
        self.records.remove(habit_id).is_some()
    }

    /// Builds records from untrusted JSON, dropping entries that cannot be repaired.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let records = value
            .as_object()
            .map(|table| {
                table
                    .iter()
                    .filter_map(|(id, raw)| DerivedGoal::from_value(raw).map(|d| (id.clone(), d)))
                    .collect()
            })
            .unwrap_or_default();
        Self { records }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_derive_from_yearly_examples() {
        assert_eq!(derive_from_yearly(365.0).daily_suggested, 1);
        assert_eq!(derive_from_yearly(12.0).monthly_target, 1);
        let d = derive_from_yearly(120.0);
        assert_eq!(d.monthly_target, 10);
        assert_eq!(d.daily_suggested, 1);
        assert!((d.daily_raw - 120.0 / 365.0).abs() < 1e-12);
        assert_eq!(derive_from_yearly(1000.0).daily_suggested, 3);
        assert_eq!(derive_from_yearly(1.0).monthly_target, 1);
    }

    #[test]
    fn test_override_keeps_daily_pace() {
        let mut derived = DerivedGoals::default();
        derived.apply_yearly("h1", 120.0);
        derived.set_override("h1", 15.0, Some(120.0));
        let record = derived.get("h1").unwrap();
        assert_eq!(derived.effective_monthly_target("h1", 99.0), 15.0);
        assert_eq!(record.monthly_target, 10);
        assert_eq!(record.daily_suggested, 1);
        assert_eq!(record.from_yearly, Some(120.0));
    }

    #[test]
    fn test_yearly_change_recomputes_but_keeps_override() {
        let mut derived = DerivedGoals::default();
        derived.apply_yearly("h1", 120.0);
        derived.set_override("h1", 15.0, Some(120.0));
        let record = derived.apply_yearly("h1", 730.0).clone();
        assert_eq!(record.monthly_target, 61);
        assert_eq!(record.daily_suggested, 2);
        assert_eq!(record.manual_monthly_override, Some(15.0));
    }

    #[test]
    fn test_effective_target_fallbacks() {
        let mut derived = DerivedGoals::default();
        assert_eq!(derived.effective_monthly_target("missing", 7.0), 7.0);
        derived.apply_yearly("h1", 24.0);
        assert_eq!(derived.effective_monthly_target("h1", 7.0), 2.0);
    }

    #[test]
    fn test_get_or_derive_is_lazy_and_stable() {
        let mut derived = DerivedGoals::default();
        let (_, created) = derived.get_or_derive("h1", 120.0);
        assert!(created);
        // A later call with another value does not recompute
        let (record, created) = derived.get_or_derive("h1", 999.0);
        assert!(!created);
        assert_eq!(record.from_yearly, Some(120.0));
    }

    #[test]
    fn test_monthly_goal_seeds_only_when_missing() {
        let mut derived = DerivedGoals::default();
        derived.apply_monthly("h1", 60.0);
        let record = derived.get("h1").unwrap().clone();
        assert_eq!(record.from_yearly, None);
        assert_eq!(record.monthly_target, 60);
        assert_eq!(record.daily_suggested, 2);
        derived.apply_monthly("h1", 90.0);
        assert_eq!(derived.get("h1").unwrap(), &record);
    }

    #[test]
    fn test_validate_target() {
        assert!(validate_target(0.0).is_err());
        assert!(validate_target(-3.0).is_err());
        assert!(validate_target(f64::NAN).is_err());
        assert_eq!(validate_target(2.5).unwrap(), 2.5);
    }

    #[test]
    fn test_from_value_repairs_records() {
        let raw = json!({
            "h1": { "fromYearly": 120, "monthlyTarget": 7.5, "dailyRaw": 0.25, "dailySuggested": 1, "manualMonthlyOverride": null },
            "h2": { "fromYearly": 365 },
            "h3": "nonsense",
            "h4": { "monthlyTarget": -1 }
        });
        let derived = DerivedGoals::from_value(&raw);
        assert_eq!(derived.len(), 2);
        assert_eq!(derived.get("h1").unwrap().monthly_target, 8);
        assert_eq!(derived.get("h2").unwrap().monthly_target, 30);
        assert_eq!(derived.get("h2").unwrap().daily_suggested, 1);
    }

    #[test]
    fn test_goals_from_value_drops_invalid_targets() {
        let goals = Goals::from_value(&json!({
            "monthly": { "h1": 10, "h2": 0, "h3": "x" },
            "yearly": "bad"
        }));
        assert_eq!(goals.monthly.len(), 1);
        assert!(goals.yearly.is_empty());
    }
}
