/// Habit entity
///
/// A habit is owned by exactly one user and lives either in the active set
/// or in the archived set. Which set it belongs to is a property of where it
/// is stored, not a field on the struct.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{HabitId, OwnerId, Title};

/// A habit the user wants to do regularly
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Habit {
    /// Owner of this habit
    pub owner_id: OwnerId,
    /// Unique identifier for this habit
    pub id: HabitId,
    /// Display title (e.g., "Read", "Morning Run")
    pub title: Title,
    /// Number of checks currently stored for this habit
    ///
    /// Only ever changed in the same transaction that creates or deletes a
    /// check, so it always matches the stored checks.
    pub checks_count: u64,
    /// When this habit was created
    pub created_at: DateTime<Utc>,
    /// When this habit was last changed (title update or archive move)
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    /// Create a brand new habit with a fresh random ID and no checks
    pub fn new(owner_id: OwnerId, title: Title, now: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            id: HabitId::new(),
            title,
            checks_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
