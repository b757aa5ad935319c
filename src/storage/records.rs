/// Fixed-shape storage records for habits and checks
///
/// Items are decoded into these structs at the storage boundary. Anything
/// that doesn't match the expected shape, or whose attributes disagree with
/// its own key, is reported as a malformed record instead of being passed
/// on half-filled.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Check, CheckDate, Habit, HabitId, OwnerId, Title};
use crate::storage::keys::{self, HabitState};
use crate::storage::table::{Item, Key, TableError};
use crate::storage::StoreError;

pub const TITLE: &str = "Title";
pub const CHECKS_COUNT: &str = "ChecksCount";
pub const UPDATED_AT: &str = "UpdatedAt";

/// Stored form of a habit, active or archived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HabitRecord {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
    #[serde(rename = "UUID")]
    pub id: HabitId,
    #[serde(rename = "UserID")]
    pub user_id: String,
    pub title: String,
    pub checks_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HabitRecord {
    pub fn new(habit: &Habit, state: HabitState) -> Self {
        let key = keys::habit_key(state, &habit.owner_id, &habit.id);
        Self {
            pk: key.pk,
            sk: key.sk,
            id: habit.id,
            user_id: habit.owner_id.to_string(),
            title: habit.title.to_string(),
            checks_count: habit.checks_count,
            created_at: habit.created_at,
            updated_at: habit.updated_at,
        }
    }

    pub fn into_item(self) -> Result<Item, TableError> {
        to_item(&self)
    }

    /// Decode an item expected to live in the `state` collection
    pub fn decode(item: Item, state: HabitState) -> Result<Habit, StoreError> {
        let key = item.key();
        let record: Self = from_item(item).map_err(|e| malformed(&key, e))?;

        let owner = keys::owner_from_partition(&record.pk)
            .ok_or_else(|| malformed(&key, "partition key is not a user partition"))?;
        if owner != record.user_id {
            return Err(malformed(&key, "UserID does not match the partition key"));
        }
        if record.sk != keys::habit_sort_key(state, &record.id) {
            return Err(malformed(&key, "sort key does not match the habit UUID"));
        }

        Ok(Habit {
            owner_id: OwnerId::new(record.user_id).map_err(|e| malformed(&key, e))?,
            id: record.id,
            title: Title::new(record.title).map_err(|e| malformed(&key, e))?,
            checks_count: record.checks_count,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Stored form of a check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckRecord {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
    #[serde(rename = "CheckDateLSISK")]
    pub check_date_lsi_sk: String,
    #[serde(rename = "HabitUUID")]
    pub habit_id: HabitId,
    pub date: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckRecord {
    pub fn new(check: &Check) -> Self {
        let key = keys::check_key(&check.owner_id, &check.habit_id, &check.date);
        Self {
            pk: key.pk,
            sk: key.sk,
            check_date_lsi_sk: keys::check_index_sort_key(&check.habit_id, &check.date),
            habit_id: check.habit_id,
            date: check.date.to_string(),
            created_at: check.created_at,
            updated_at: check.updated_at,
        }
    }

    pub fn into_item(self) -> Result<Item, TableError> {
        to_item(&self)
    }

    pub fn decode(item: Item) -> Result<Check, StoreError> {
        let key = item.key();
        let record: Self = from_item(item).map_err(|e| malformed(&key, e))?;

        let owner = keys::owner_from_partition(&record.pk)
            .ok_or_else(|| malformed(&key, "partition key is not a user partition"))?;
        let date = CheckDate::parse(&record.date).map_err(|e| malformed(&key, e))?;
        if record.sk != keys::check_sort_key(&record.habit_id, &date) {
            return Err(malformed(&key, "sort key does not match HabitUUID and Date"));
        }
        if record.check_date_lsi_sk != keys::check_index_sort_key(&record.habit_id, &date) {
            return Err(malformed(&key, "index sort key does not match HabitUUID and Date"));
        }

        Ok(Check {
            owner_id: OwnerId::new(owner).map_err(|e| malformed(&key, e))?,
            habit_id: record.habit_id,
            date,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Attribute value of a timestamp, in the same format records use
pub fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn to_item<T: Serialize>(record: &T) -> Result<Item, TableError> {
    match serde_json::to_value(record)? {
        Value::Object(attributes) => Item::from_attributes(attributes),
        other => Err(TableError::Validation(format!(
            "record encoded as {other} instead of an attribute map"
        ))),
    }
}

fn from_item<T: for<'de> Deserialize<'de>>(item: Item) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(item.into_attributes()))
}

fn malformed(key: &Key, reason: impl ToString) -> StoreError {
    StoreError::Malformed {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
