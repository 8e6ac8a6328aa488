//! Aggregation engine - daily, monthly and yearly statistics over the sparse log.
//!
//! All functions are pure: they take the state and an explicit "today" and never read
//! the clock. Every percentage is `round1(100 * numerator / denominator)` with a zero
//! denominator reported as 0 and flagged through `is_unscheduled()`.

use crate::core::{
    date_key,
    goals::{DerivedGoal, GoalKind},
    habit::Habit,
    log_store::LogStore,
    schedule,
    state::AppState,
};
use chrono::{Datelike, Days, NaiveDate};

/// Rounds to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    ((value + f64::EPSILON) * 10.0).round() / 10.0
}

/// `round1(100 * numerator / denominator)`, or 0 when the denominator is not positive.
#[must_use]
pub fn ratio_percent(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    round1(numerator / denominator * 100.0)
}

/// Partial-credit completion for one date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyStats {
    /// Habits due on the date
    pub scheduled: u32,
    /// Due habits marked done
    pub done: u32,
    /// Rounded percentage
    pub percent: f64,
}

impl DailyStats {
    /// True when no habit was due, so `percent` is meaningless.
    #[must_use]
    pub const fn is_unscheduled(&self) -> bool {
        self.scheduled == 0
    }
}

/// All-or-nothing completion over the elapsed days of the month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyStats {
    /// Days with at least one due habit
    pub scheduled_days: u32,
    /// Days on which every due habit was done
    pub completed_days: u32,
    /// Rounded percentage
    pub percent: f64,
}

impl MonthlyStats {
    /// True when no day so far had a due habit.
    #[must_use]
    pub const fn is_unscheduled(&self) -> bool {
        self.scheduled_days == 0
    }
}

/// Unit of a [`YearlyStats`] figure. The two modes are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YearlyMode {
    /// Sum of done counts over sum of yearly targets
    GoalWeighted,
    /// Sum of daily done over sum of daily scheduled since Jan 1
    HabitDayWeighted,
}

/// Year-to-date progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearlyStats {
    /// Which unit the figures are in
    pub mode: YearlyMode,
    /// Achieved count
    pub numerator: f64,
    /// Target sum or scheduled habit-days
    pub denominator: f64,
    /// Rounded percentage
    pub percent: f64,
}

impl YearlyStats {
    /// True when there is nothing to measure against.
    #[must_use]
    pub fn is_unscheduled(&self) -> bool {
        self.denominator <= 0.0
    }
}

/// One cell of the month calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDay {
    /// Day of month, 1-based
    pub day: u32,
    /// Date key of the cell
    pub key: String,
    /// Due habits done that day
    pub done: u32,
    /// Habits due that day
    pub scheduled: u32,
    /// `done / scheduled`, 0 when nothing is due
    pub ratio: f64,
}

impl CalendarDay {
    /// True when no habit was due on this day.
    #[must_use]
    pub const fn is_unscheduled(&self) -> bool {
        self.scheduled == 0
    }
}

/// Calendar of the month containing "today".
#[derive(Debug, Clone, PartialEq)]
pub struct MonthCalendar {
    /// Calendar year
    pub year: i32,
    /// Month, 1-based
    pub month: u32,
    /// Weekday of the 1st (Sunday = 0)
    pub first_weekday: u8,
    /// One entry for every day of the month
    pub days: Vec<CalendarDay>,
}

/// Achieved versus target for one goal.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalProgress {
    /// Habit the goal belongs to
    pub habit_id: String,
    /// Habit display name
    pub habit_name: String,
    /// Monthly or yearly
    pub kind: GoalKind,
    /// Target count
    pub target: f64,
    /// Done count in the current month or year
    pub achieved: u32,
    /// Rounded percentage, clamped to 100
    pub percent: f64,
}

impl GoalProgress {
    /// Goals always have a positive target, so this only guards malformed data.
    #[must_use]
    pub fn is_unscheduled(&self) -> bool {
        self.target <= 0.0
    }
}

/// Breakdown of one yearly goal.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalInsight {
    /// Habit the goal belongs to
    pub habit_id: String,
    /// Habit display name
    pub habit_name: String,
    /// Yearly target
    pub yearly_target: f64,
    /// Stored derived record (or a fresh one when none was created yet)
    pub derived: DerivedGoal,
    /// Override if set, else the derived monthly target
    pub effective_monthly_target: f64,
    /// Done days this year
    pub yearly_done: u32,
    /// `yearly_done` against the yearly target
    pub yearly_percent: f64,
    /// Done days this month
    pub monthly_done: u32,
    /// `monthly_done` against the effective monthly target
    pub monthly_percent: f64,
    /// Habit's partial-credit consistency this month
    pub consistency: f64,
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn daily_for(habits: &[Habit], logs: &LogStore, date: NaiveDate) -> DailyStats {
    let key = date_key::to_key(date);
    let due = schedule::scheduled_habits(habits, date);
    let done = due.iter().filter(|h| logs.is_done(&h.id, &key)).count();
    let (scheduled, done) = (count(due.len()), count(done));
    DailyStats {
        scheduled,
        done,
        percent: ratio_percent(f64::from(done), f64::from(scheduled)),
    }
}

/// Days from the 1st of `today`'s month up to and including `today`.
fn elapsed_days_of_month(today: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    date_key::month_start(today)
        .iter_days()
        .take_while(move |d| *d <= today)
}

/// Daily stats for the date named by `date_key`; an invalid key has nothing due.
#[must_use]
pub fn daily_stats(state: &AppState, date_key: &str) -> DailyStats {
    date_key::parse_key(date_key).map_or(
        DailyStats {
            scheduled: 0,
            done: 0,
            percent: 0.0,
        },
        |date| daily_for(state.habits(), state.logs(), date),
    )
}

/// Daily stats for `days` consecutive dates ending at `today`, newest first.
#[must_use]
pub fn recent_daily_stats(state: &AppState, today: NaiveDate, days: u32) -> Vec<(String, DailyStats)> {
    (0..u64::from(days))
        .map_while(|back| today.checked_sub_days(Days::new(back)))
        .map(|date| (date_key::to_key(date), daily_for(state.habits(), state.logs(), date)))
        .collect()
}

/// Month-to-date stats with day-level all-or-nothing semantics.
#[must_use]
pub fn monthly_stats(state: &AppState, today: NaiveDate) -> MonthlyStats {
    let mut scheduled_days = 0;
    let mut completed_days = 0;
    for date in elapsed_days_of_month(today) {
        let daily = daily_for(state.habits(), state.logs(), date);
        if daily.scheduled > 0 {
            scheduled_days += 1;
            if daily.done == daily.scheduled {
                completed_days += 1;
            }
        }
    }
    MonthlyStats {
        scheduled_days,
        completed_days,
        percent: ratio_percent(f64::from(completed_days), f64::from(scheduled_days)),
    }
}

/// Year-to-date stats: goal-weighted when any yearly goal belongs to an existing habit,
/// habit-day weighted otherwise.
#[must_use]
pub fn yearly_stats(state: &AppState, today: NaiveDate) -> YearlyStats {
    let year = today.year();
    let goals: Vec<(&String, f64)> = state
        .goals()
        .yearly
        .iter()
        .filter(|(id, _)| state.habit(id).is_some())
        .map(|(id, target)| (id, *target))
        .collect();

    let (mode, numerator, denominator) = if goals.is_empty() {
        let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(today);
        let (done, scheduled) = start
            .iter_days()
            .take_while(|d| *d <= today)
            .map(|d| daily_for(state.habits(), state.logs(), d))
            .fold((0.0, 0.0), |(done, scheduled), day| {
                (done + f64::from(day.done), scheduled + f64::from(day.scheduled))
            });
        (YearlyMode::HabitDayWeighted, done, scheduled)
    } else {
        let (done, target) = goals.iter().fold((0.0, 0.0), |(done, target), (id, t)| {
            (done + f64::from(state.logs().done_count_in_year(id, year)), target + t)
        });
        (YearlyMode::GoalWeighted, done, target)
    };

    YearlyStats {
        mode,
        numerator,
        denominator,
        percent: ratio_percent(numerator, denominator),
    }
}

/// Consecutive done days ending today.
///
/// A skip or pending day ends the streak. The walk is bounded by the number of log
/// buckets, since every counted day needs one.
#[must_use]
pub fn streak(state: &AppState, habit_id: &str, today: NaiveDate) -> u32 {
    let max_steps = state.logs().len() + 1;
    let mut streak = 0;
    let mut cursor = Some(today);
    for _ in 0..max_steps {
        let Some(date) = cursor else { break };
        if !state.logs().is_done(habit_id, &date_key::to_key(date)) {
            break;
        }
        streak += 1;
        cursor = date.pred_opt();
    }
    streak
}

/// One habit's month-to-date partial-credit consistency.
/// Unknown habits have 0.
#[must_use]
pub fn monthly_consistency(state: &AppState, habit_id: &str, today: NaiveDate) -> f64 {
    let Some(habit) = state.habit(habit_id) else {
        return 0.0;
    };
    let (done, scheduled) = elapsed_days_of_month(today)
        .filter(|d| schedule::is_due_on(habit, *d))
        .fold((0u32, 0u32), |(done, scheduled), d| {
            let is_done = state.logs().is_done(habit_id, &date_key::to_key(d));
            (done + u32::from(is_done), scheduled + 1)
        });
    ratio_percent(f64::from(done), f64::from(scheduled))
}

/// Every day of `today`'s month with due-based done/scheduled counts.
#[must_use]
pub fn monthly_calendar(state: &AppState, today: NaiveDate) -> MonthCalendar {
    let start = date_key::month_start(today);
    let days = start
        .iter_days()
        .take(usize::try_from(date_key::days_in_month(today)).unwrap_or(31))
        .map(|date| {
            let daily = daily_for(state.habits(), state.logs(), date);
            CalendarDay {
                day: date.day(),
                key: date_key::to_key(date),
                done: daily.done,
                scheduled: daily.scheduled,
                ratio: if daily.scheduled == 0 {
                    0.0
                } else {
                    f64::from(daily.done) / f64::from(daily.scheduled)
                },
            }
        })
        .collect();
    MonthCalendar {
        year: today.year(),
        month: today.month(),
        first_weekday: date_key::weekday_index(start),
        days,
    }
}

/// Progress rows for every monthly goal, then every yearly goal, of existing habits.
#[must_use]
pub fn goal_progress(state: &AppState, today: NaiveDate) -> Vec<GoalProgress> {
    [GoalKind::Monthly, GoalKind::Yearly]
        .into_iter()
        .flat_map(|kind| {
            state
                .goals()
                .table(kind)
                .iter()
                .filter_map(move |(id, target)| {
                    let habit = state.habit(id)?;
                    let achieved = match kind {
                        GoalKind::Monthly => {
                            state.logs().done_count_in_month(id, today.year(), today.month())
                        }
                        GoalKind::Yearly => state.logs().done_count_in_year(id, today.year()),
                    };
                    Some(GoalProgress {
                        habit_id: id.clone(),
                        habit_name: habit.name.clone(),
                        kind,
                        target: *target,
                        achieved,
                        percent: ratio_percent(f64::from(achieved), *target).min(100.0),
                    })
                })
        })
        .collect()
}

/// Insight rows for every yearly goal of an existing habit.
///
/// Uses the stored derived record when present; callers that want the record
/// persisted create it first (see `HabitService::goal_insights`).
#[must_use]
pub fn goal_insights(state: &AppState, today: NaiveDate) -> Vec<GoalInsight> {
    state
        .goals()
        .yearly
        .iter()
        .filter_map(|(id, target)| {
            let habit = state.habit(id)?;
            let derived = state
                .derived_goals()
                .get(id)
                .cloned()
                .unwrap_or_else(|| DerivedGoal::from_yearly(*target));
            let effective_monthly_target = derived.effective_monthly();
            let yearly_done = state.logs().done_count_in_year(id, today.year());
            let monthly_done = state
                .logs()
                .done_count_in_month(id, today.year(), today.month());
            Some(GoalInsight {
                habit_id: id.clone(),
                habit_name: habit.name.clone(),
                yearly_target: *target,
                effective_monthly_target,
                yearly_done,
                yearly_percent: ratio_percent(f64::from(yearly_done), *target),
                monthly_done,
                monthly_percent: ratio_percent(f64::from(monthly_done), effective_monthly_target),
                consistency: monthly_consistency(state, id, today),
                derived,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::{
        habit::Frequency,
        log_store::StatusUpdate,
        state::StateDefaults,
    };
    use crate::test_utils::{date, habit_created_on};

    fn state_with(habits: Vec<Habit>) -> AppState {
        let mut state = AppState::new(&StateDefaults::default());
        state.habits = habits;
        state
    }

    fn mark(state: &mut AppState, habit_id: &str, day: NaiveDate, update: StatusUpdate) {
        state
            .logs
            .set_status(habit_id, &date_key::to_key(day), update);
    }

    #[test]
    fn test_round1_and_zero_denominator() {
        assert_eq!(ratio_percent(1.0, 3.0), 33.3);
        assert_eq!(ratio_percent(2.0, 3.0), 66.7);
        assert_eq!(ratio_percent(5.0, 0.0), 0.0);
        assert_eq!(round1(0.05), 0.1);
    }

    #[test]
    fn test_daily_stats_only_counts_due_habits() {
        // A is daily, B is weekly on Mondays
        let a = habit_created_on("A", Frequency::Daily, date(2026, 10, 12));
        let b = habit_created_on("B", Frequency::Weekly, date(2026, 10, 12));
        let a_id = a.id.clone();
        let mut state = state_with(vec![a, b]);
        let tuesday = date(2026, 10, 13);
        mark(&mut state, &a_id, tuesday, StatusUpdate::Done);

        let stats = daily_stats(&state, "2026-10-13");
        assert_eq!(stats.scheduled, 1);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.percent, 100.0);
        assert!(!stats.is_unscheduled());
    }

    #[test]
    fn test_daily_stats_with_nothing_due_is_flagged() {
        let b = habit_created_on("B", Frequency::Weekly, date(2026, 10, 12));
        let state = state_with(vec![b]);
        let stats = daily_stats(&state, "2026-10-13");
        assert!(stats.is_unscheduled());
        assert_eq!(stats.percent, 0.0);
        assert!(daily_stats(&state, "not-a-date").is_unscheduled());
    }

    #[test]
    fn test_monthly_stats_all_or_nothing() {
        let a = habit_created_on("A", Frequency::Daily, date(2026, 10, 1));
        let a_id = a.id.clone();
        let mut state = state_with(vec![a]);
        mark(&mut state, &a_id, date(2026, 10, 1), StatusUpdate::Done);

        let stats = monthly_stats(&state, date(2026, 10, 2));
        assert_eq!(stats.scheduled_days, 2);
        assert_eq!(stats.completed_days, 1);
        assert_eq!(stats.percent, 50.0);
    }

    #[test]
    fn test_monthly_stats_partial_day_does_not_count() {
        let a = habit_created_on("A", Frequency::Daily, date(2026, 10, 1));
        let b = habit_created_on("B", Frequency::Daily, date(2026, 10, 1));
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        let mut state = state_with(vec![a, b]);
        mark(&mut state, &a_id, date(2026, 10, 1), StatusUpdate::Done);
        mark(&mut state, &b_id, date(2026, 10, 1), StatusUpdate::Skip);

        let stats = monthly_stats(&state, date(2026, 10, 1));
        assert_eq!(stats.scheduled_days, 1);
        assert_eq!(stats.completed_days, 0);
        // Daily view gives partial credit for the same day
        assert_eq!(daily_stats(&state, "2026-10-01").percent, 50.0);
    }

    #[test]
    fn test_monthly_stats_without_habits_is_unscheduled() {
        let state = state_with(Vec::new());
        assert!(monthly_stats(&state, date(2026, 10, 16)).is_unscheduled());
    }

    #[test]
    fn test_streak_stops_at_skip() {
        let a = habit_created_on("A", Frequency::Daily, date(2026, 10, 1));
        let a_id = a.id.clone();
        let mut state = state_with(vec![a]);
        let today = date(2026, 10, 16);
        mark(&mut state, &a_id, today, StatusUpdate::Done);
        mark(&mut state, &a_id, date(2026, 10, 15), StatusUpdate::Done);
        mark(&mut state, &a_id, date(2026, 10, 14), StatusUpdate::Skip);
        mark(&mut state, &a_id, date(2026, 10, 13), StatusUpdate::Done);
        assert_eq!(streak(&state, &a_id, today), 2);
    }

    #[test]
    fn test_streak_is_zero_when_today_pending() {
        let a = habit_created_on("A", Frequency::Daily, date(2026, 10, 1));
        let a_id = a.id.clone();
        let mut state = state_with(vec![a]);
        mark(&mut state, &a_id, date(2026, 10, 15), StatusUpdate::Done);
        assert_eq!(streak(&state, &a_id, date(2026, 10, 16)), 0);
        assert_eq!(streak(&state, "ghost", date(2026, 10, 16)), 0);
    }

    #[test]
    fn test_yearly_stats_modes() {
        let a = habit_created_on("A", Frequency::Daily, date(2026, 1, 1));
        let a_id = a.id.clone();
        let mut state = state_with(vec![a]);
        mark(&mut state, &a_id, date(2026, 1, 1), StatusUpdate::Done);
        mark(&mut state, &a_id, date(2026, 1, 2), StatusUpdate::Done);

        let day_weighted = yearly_stats(&state, date(2026, 1, 4));
        assert_eq!(day_weighted.mode, YearlyMode::HabitDayWeighted);
        assert_eq!(day_weighted.numerator, 2.0);
        assert_eq!(day_weighted.denominator, 4.0);
        assert_eq!(day_weighted.percent, 50.0);

        state.goals.yearly.insert(a_id.clone(), 8.0);
        // Goals of deleted habits are ignored
        state.goals.yearly.insert("ghost".to_string(), 100.0);
        let goal_weighted = yearly_stats(&state, date(2026, 1, 4));
        assert_eq!(goal_weighted.mode, YearlyMode::GoalWeighted);
        assert_eq!(goal_weighted.denominator, 8.0);
        assert_eq!(goal_weighted.percent, 25.0);
    }

    #[test]
    fn test_monthly_consistency_uses_schedule() {
        // Weekly on Mondays: Oct 5 and Oct 12 are the due days up to Oct 16
        let b = habit_created_on("B", Frequency::Weekly, date(2026, 9, 28));
        let b_id = b.id.clone();
        let mut state = state_with(vec![b]);
        mark(&mut state, &b_id, date(2026, 10, 5), StatusUpdate::Done);
        mark(&mut state, &b_id, date(2026, 10, 6), StatusUpdate::Done);
        assert_eq!(monthly_consistency(&state, &b_id, date(2026, 10, 16)), 50.0);
        assert_eq!(monthly_consistency(&state, "ghost", date(2026, 10, 16)), 0.0);
    }

    #[test]
    fn test_monthly_calendar_covers_whole_month() {
        let a = habit_created_on("A", Frequency::Daily, date(2026, 10, 1));
        let a_id = a.id.clone();
        let mut state = state_with(vec![a]);
        mark(&mut state, &a_id, date(2026, 10, 3), StatusUpdate::Done);

        let calendar = monthly_calendar(&state, date(2026, 10, 16));
        assert_eq!(calendar.days.len(), 31);
        // 2026-10-01 is a Thursday
        assert_eq!(calendar.first_weekday, 4);
        assert_eq!(calendar.days[2].key, "2026-10-03");
        assert_eq!(calendar.days[2].ratio, 1.0);
        assert_eq!(calendar.days[30].scheduled, 1);
        assert_eq!(monthly_calendar(&state, date(2026, 2, 10)).days.len(), 28);
    }

    #[test]
    fn test_goal_progress_clamps_percent() {
        let a = habit_created_on("A", Frequency::Daily, date(2026, 10, 1));
        let a_id = a.id.clone();
        let mut state = state_with(vec![a]);
        for day in 1..=4 {
            mark(&mut state, &a_id, date(2026, 10, day), StatusUpdate::Done);
        }
        mark(&mut state, &a_id, date(2026, 9, 30), StatusUpdate::Done);
        state.goals.monthly.insert(a_id.clone(), 2.0);
        state.goals.yearly.insert(a_id.clone(), 50.0);

        let rows = goal_progress(&state, date(2026, 10, 16));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, GoalKind::Monthly);
        assert_eq!(rows[0].achieved, 4);
        assert_eq!(rows[0].percent, 100.0);
        assert_eq!(rows[1].kind, GoalKind::Yearly);
        assert_eq!(rows[1].achieved, 5);
        assert_eq!(rows[1].percent, 10.0);
    }

    #[test]
    fn test_goal_insights_use_override() {
        let a = habit_created_on("A", Frequency::Daily, date(2026, 10, 1));
        let a_id = a.id.clone();
        let mut state = state_with(vec![a]);
        for day in 1..=3 {
            mark(&mut state, &a_id, date(2026, 10, day), StatusUpdate::Done);
        }
        state.set_goal(&a_id, GoalKind::Yearly, 120.0).unwrap();
        state.set_monthly_override(&a_id, 15.0).unwrap();

        let insights = goal_insights(&state, date(2026, 10, 16));
        assert_eq!(insights.len(), 1);
        let row = &insights[0];
        assert_eq!(row.effective_monthly_target, 15.0);
        assert_eq!(row.monthly_percent, 20.0);
        assert_eq!(row.yearly_percent, 2.5);
        assert_eq!(row.derived.daily_suggested, 1);
        assert_eq!(row.consistency, round1(300.0 / 16.0));
    }

    #[test]
    fn test_recent_daily_stats_newest_first() {
        let a = habit_created_on("A", Frequency::Daily, date(2026, 10, 1));
        let state = state_with(vec![a]);
        let rows = recent_daily_stats(&state, date(2026, 10, 16), 14);
        assert_eq!(rows.len(), 14);
        assert_eq!(rows[0].0, "2026-10-16");
        assert_eq!(rows[13].0, "2026-10-03");
    }
}
