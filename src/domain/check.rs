/// Check entity for tracking habit completions
///
/// A check records that a habit was completed on a given calendar day.
/// There is at most one check per habit per day.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{CheckDate, HabitId, OwnerId};

/// A record of completing a habit on a specific day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Check {
    pub owner_id: OwnerId,
    /// Which habit this check is for
    pub habit_id: HabitId,
    /// Which day the habit was completed on
    pub date: CheckDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Check {
    pub fn new(owner_id: OwnerId, habit_id: HabitId, date: CheckDate, now: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            habit_id,
            date,
            created_at: now,
            updated_at: now,
        }
    }
}
