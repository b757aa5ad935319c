/// Read models composed from store queries
///
/// The top view lists active habits newest first, each annotated with its
/// most recent check in the recent window, next to the archived habits.
/// The detail view shows one habit with its latest checks and the day it is
/// next due.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::domain::{Check, CheckDate, Habit, HabitId, OwnerId};
use crate::storage::{HabitStore, StoreError, Table};

/// An active habit together with its newest recent check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitSummary {
    pub habit: Habit,
    pub latest_check: Option<Check>,
}

/// Everything an owner sees on the top view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub habits: Vec<HabitSummary>,
    pub archived_habits: Vec<Habit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitDetail {
    pub habit: Habit,
    /// Newest first
    pub latest_checks: Vec<Check>,
    pub next_check_date: Option<CheckDate>,
}

/// Sort habits newest first and attach the latest of their recent checks
///
/// Checks of habits not in `habits` are ignored.
pub fn summarize(mut habits: Vec<Habit>, recent_checks: &[Check]) -> Vec<HabitSummary> {
    let mut latest: HashMap<HabitId, &Check> = HashMap::new();
    for check in recent_checks {
        latest
            .entry(check.habit_id)
            .and_modify(|current| {
                if check.date > current.date {
                    *current = check;
                }
            })
            .or_insert(check);
    }

    habits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    habits
        .into_iter()
        .map(|habit| {
            let latest_check = latest.get(&habit.id).map(|check| (*check).clone());
            HabitSummary {
                habit,
                latest_check,
            }
        })
        .collect()
}

/// The day after the newest check, or `None` when there are no checks
pub fn next_check_date(checks: &[Check]) -> Option<CheckDate> {
    checks
        .iter()
        .map(|check| check.date)
        .max()
        .and_then(|date| date.succ())
}

impl<T: Table> HabitStore<T> {
    /// Active habits with their recent activity, plus the archived habits
    pub async fn overview(&self, owner: &OwnerId, window_days: u32) -> Result<Overview, StoreError> {
        let habits = self.list_habits(owner).await?;
        let recent = self
            .list_recent_checks_across_habits(owner, window_days)
            .await?;
        let archived_habits = self.list_archived_habits(owner).await?;

        debug!(
            owner = %owner,
            habits = habits.len(),
            recent_checks = recent.len(),
            archived = archived_habits.len(),
            "built overview"
        );
        Ok(Overview {
            habits: summarize(habits, &recent),
            archived_habits,
        })
    }

    /// One active habit with its newest `limit` checks
    pub async fn habit_detail(
        &self,
        owner: &OwnerId,
        habit_id: &HabitId,
        limit: u32,
    ) -> Result<HabitDetail, StoreError> {
        let habit = self.find_habit(owner, habit_id).await?;
        let latest_checks = self.list_latest_checks(owner, habit_id, limit).await?;
        let next_check_date = next_check_date(&latest_checks);

        Ok(HabitDetail {
            habit,
            latest_checks,
            next_check_date,
        })
    }
}
