/// Core identifier and value types used throughout the domain layer
///
/// This module defines OwnerId, HabitId, Title and CheckDate. Each one is
/// validated on construction, so anything holding one of these values can
/// build storage keys from it without further checks.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::DomainError;

/// Maximum habit title length, counted in Unicode code points
pub const MAX_TITLE_CHARS: usize = 50;

/// Wire format of a check date
pub const CHECK_DATE_FORMAT: &str = "%Y-%m-%d";

/// Identity of the authenticated user owning habits and checks
///
/// The value comes from the identity service and is opaque to the store.
/// It is always embedded in the partition key, which is what keeps one
/// owner's items invisible to every other owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidOwner("owner id cannot be empty".to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a habit
///
/// A wrapper around a random UUID so a habit ID can't be confused with any
/// other string flowing through the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(pub Uuid);

impl HabitId {
    /// Generate a new random habit ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a habit ID from its string-encoded UUID form
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidHabitId(format!("{s:?}: {e}")))
    }
}

impl Default for HabitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphenated lowercase, the form embedded in keys
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for HabitId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A validated habit title
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Title(String);

impl Title {
    /// Validate a title: 1 to 50 Unicode code points, taken as given.
    pub fn new(title: impl Into<String>) -> Result<Self, DomainError> {
        let title = title.into();
        let chars = title.chars().count();

        if chars == 0 {
            return Err(DomainError::InvalidTitle(
                "Habit title cannot be empty".to_string(),
            ));
        }

        if chars > MAX_TITLE_CHARS {
            return Err(DomainError::InvalidTitle(format!(
                "Habit title cannot be longer than {MAX_TITLE_CHARS} characters, got {chars}"
            )));
        }

        Ok(Self(title))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Calendar day a check was recorded for
///
/// Dates are embedded in sort keys as `YYYY-MM-DD`, so only four-digit
/// years are accepted; for those, string order and date order agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CheckDate(NaiveDate);

impl CheckDate {
    pub fn new(date: NaiveDate) -> Result<Self, DomainError> {
        if !(0..=9999).contains(&date.year()) {
            return Err(DomainError::InvalidDate(format!(
                "year {} is outside 0000-9999",
                date.year()
            )));
        }
        Ok(Self(date))
    }

    /// Parse an ISO-8601 calendar date (`YYYY-MM-DD`)
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        // chrono accepts unpadded fields; the round trip below rejects them
        let date = NaiveDate::parse_from_str(s, CHECK_DATE_FORMAT).map_err(|e| {
            DomainError::InvalidDate(format!("{s:?} must be formatted as YYYY-MM-DD: {e}"))
        })?;
        let date = Self::new(date)?;
        if date.to_string() != s {
            return Err(DomainError::InvalidDate(format!(
                "{s:?} must be formatted as YYYY-MM-DD"
            )));
        }
        Ok(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The following calendar day, if it is still representable
    pub fn succ(&self) -> Option<Self> {
        self.0.succ_opt().and_then(|d| Self::new(d).ok())
    }
}

impl fmt::Display for CheckDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CHECK_DATE_FORMAT))
    }
}

impl FromStr for CheckDate {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
