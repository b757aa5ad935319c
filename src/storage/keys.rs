/// Single-table key schema
///
/// All items of one owner share the partition `USER#{owner}`. The sort key
/// prefix tells the item type apart:
///
/// | Collection      | Sort key                              |
/// |-----------------|---------------------------------------|
/// | Active habits   | `HABITS#{habit_id}`                   |
/// | Archived habits | `ARCHIVED_HABITS#{habit_id}`          |
/// | Checks          | `HABIT#{habit_id}__CHECK_DATE#{date}` |
///
/// Checks also carry `CheckDateLSISK = CHECK_DATE#{date}__HABIT#{habit_id}`,
/// the sort key of the `CheckDateLSI` local index, so checks across all
/// habits can be scanned in date order.

use crate::domain::{CheckDate, HabitId, OwnerId};
use crate::storage::table::{Key, LocalIndex, TableDefinition};

pub const USER_PREFIX: &str = "USER#";
pub const HABITS_PREFIX: &str = "HABITS#";
pub const ARCHIVED_HABITS_PREFIX: &str = "ARCHIVED_HABITS#";
pub const CHECK_DATE_PREFIX: &str = "CHECK_DATE#";

/// Name of the date-ordered local secondary index
pub const CHECK_DATE_INDEX: &str = "CheckDateLSI";

/// Attribute holding the sort key of [`CHECK_DATE_INDEX`]
pub const CHECK_DATE_INDEX_SORT_KEY: &str = "CheckDateLSISK";

/// Table layout the habit store expects
pub fn habit_table(name: impl Into<String>) -> TableDefinition {
    TableDefinition {
        name: name.into(),
        local_index: Some(LocalIndex {
            name: CHECK_DATE_INDEX.to_string(),
            sort_key: CHECK_DATE_INDEX_SORT_KEY.to_string(),
        }),
    }
}

/// Whether a habit lives in the active or the archived collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HabitState {
    Active,
    Archived,
}

impl HabitState {
    pub fn prefix(self) -> &'static str {
        match self {
            HabitState::Active => HABITS_PREFIX,
            HabitState::Archived => ARCHIVED_HABITS_PREFIX,
        }
    }

    /// The collection a habit moves to when toggled
    pub fn toggled(self) -> Self {
        match self {
            HabitState::Active => HabitState::Archived,
            HabitState::Archived => HabitState::Active,
        }
    }
}

pub fn owner_partition(owner: &OwnerId) -> String {
    format!("{USER_PREFIX}{owner}")
}

/// Recover the owner from a partition key
pub fn owner_from_partition(pk: &str) -> Option<&str> {
    pk.strip_prefix(USER_PREFIX).filter(|owner| !owner.is_empty())
}

pub fn habit_sort_key(state: HabitState, habit_id: &HabitId) -> String {
    format!("{}{habit_id}", state.prefix())
}

pub fn habit_key(state: HabitState, owner: &OwnerId, habit_id: &HabitId) -> Key {
    Key::new(owner_partition(owner), habit_sort_key(state, habit_id))
}

/// Sort key prefix shared by every check of one habit
pub fn check_prefix(habit_id: &HabitId) -> String {
    format!("HABIT#{habit_id}__{CHECK_DATE_PREFIX}")
}

pub fn check_sort_key(habit_id: &HabitId, date: &CheckDate) -> String {
    format!("{}{date}", check_prefix(habit_id))
}

pub fn check_key(owner: &OwnerId, habit_id: &HabitId, date: &CheckDate) -> Key {
    Key::new(owner_partition(owner), check_sort_key(habit_id, date))
}

/// Index sort key of a check: date first, so the index orders by day
pub fn check_index_sort_key(habit_id: &HabitId, date: &CheckDate) -> String {
    format!("{}__HABIT#{habit_id}", check_index_lower_bound(date))
}

/// Smallest index sort key of any check dated on or after `date`
pub fn check_index_lower_bound(date: &CheckDate) -> String {
    format!("{CHECK_DATE_PREFIX}{date}")
}
