/// Habit store: every habit and check operation over a wide-column table
///
/// Each operation takes the owner explicitly and builds every key from it,
/// which is the only thing separating one owner's data from another's.
/// The store keeps no state between calls beyond its configuration.
///
/// Writes that must stay consistent with each other go through one
/// `transact_write`:
///
/// - creating a check inserts it and increments the habit's `ChecksCount`
/// - deleting a check removes it and decrements `ChecksCount`
/// - archiving or unarchiving deletes the habit from one collection and
///   inserts it into the other
///
/// Condition failures inside those transactions are translated into
/// `NotFound` or `Conflict`. Nothing is retried.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::domain::{Check, CheckDate, DomainError, Habit, HabitId, OwnerId, Title};
use crate::storage::keys::{self, HabitState, CHECK_DATE_INDEX};
use crate::storage::records::{self, CheckRecord, HabitRecord, CHECKS_COUNT, TITLE, UPDATED_AT};
use crate::storage::table::{
    CancellationReason, Condition, Item, QueryInput, SortCondition, Table, TableError,
    TransactWriteItem, UpdateAction,
};
use crate::storage::StoreError;

/// Deadline applied to each store operation unless configured otherwise
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the current time
pub type Clock = fn() -> DateTime<Utc>;

/// Habit and check operations for any table backend
#[derive(Clone)]
pub struct HabitStore<T> {
    table: T,
    request_timeout: Duration,
    clock: Clock,
}

impl<T: Table> HabitStore<T> {
    pub fn new(table: T) -> Self {
        Self {
            table,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            clock: Utc::now,
        }
    }

    /// Give up on an operation once it has been waiting this long
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// All active habits of the owner, in no particular order
    pub async fn list_habits(&self, owner: &OwnerId) -> Result<Vec<Habit>, StoreError> {
        const OP: &str = "list_habits";
        self.bounded(OP, self.list_in(OP, owner, HabitState::Active))
            .await
    }

    /// All archived habits of the owner, in no particular order
    pub async fn list_archived_habits(&self, owner: &OwnerId) -> Result<Vec<Habit>, StoreError> {
        const OP: &str = "list_archived_habits";
        self.bounded(OP, self.list_in(OP, owner, HabitState::Archived))
            .await
    }

    /// Look up an active habit; archived habits are not found here
    pub async fn find_habit(&self, owner: &OwnerId, habit_id: &HabitId) -> Result<Habit, StoreError> {
        const OP: &str = "find_habit";
        self.bounded(OP, self.find_in(OP, owner, habit_id, HabitState::Active))
            .await
    }

    pub async fn find_archived_habit(
        &self,
        owner: &OwnerId,
        habit_id: &HabitId,
    ) -> Result<Habit, StoreError> {
        const OP: &str = "find_archived_habit";
        self.bounded(OP, self.find_in(OP, owner, habit_id, HabitState::Archived))
            .await
    }

    /// Create an active habit with a fresh random ID
    ///
    /// The write is unconditional: a new random UUID can't collide with an
    /// existing habit in practice.
    pub async fn create_habit(&self, owner: &OwnerId, title: &str) -> Result<Habit, StoreError> {
        const OP: &str = "create_habit";
        let title = Title::new(title)?;

        self.bounded(OP, async {
            let habit = Habit::new(owner.clone(), title, self.now());
            let item = HabitRecord::new(&habit, HabitState::Active)
                .into_item()
                .map_err(storage(OP))?;

            self.table.put_item(item, None).await.map_err(storage(OP))?;

            debug!(owner = %owner, habit_id = %habit.id, "created habit");
            Ok(habit)
        })
        .await
    }

    /// Rename an active habit and refresh its `updated_at`
    pub async fn update_habit_title(
        &self,
        owner: &OwnerId,
        habit_id: &HabitId,
        title: &str,
    ) -> Result<(), StoreError> {
        const OP: &str = "update_habit_title";
        let title = Title::new(title)?;

        self.bounded(OP, async {
            let key = keys::habit_key(HabitState::Active, owner, habit_id);
            let actions = vec![
                UpdateAction::Set(TITLE.to_string(), Value::String(title.into_inner())),
                UpdateAction::Set(UPDATED_AT.to_string(), records::timestamp(self.now())),
            ];

            // Without the condition the update would create a partial habit
            match self
                .table
                .update_item(&key, actions, Some(Condition::item_exists()))
                .await
            {
                Ok(()) => {
                    debug!(owner = %owner, habit_id = %habit_id, "renamed habit");
                    Ok(())
                }
                Err(TableError::ConditionalCheckFailed) => Err(StoreError::NotFound {
                    operation: OP,
                    key: key.to_string(),
                }),
                Err(e) => Err(storage(OP)(e)),
            }
        })
        .await
    }

    /// Delete an active habit; deleting a missing habit is not an error
    ///
    /// Checks of the habit are left in place.
    pub async fn delete_habit(&self, owner: &OwnerId, habit_id: &HabitId) -> Result<(), StoreError> {
        const OP: &str = "delete_habit";
        self.bounded(OP, async {
            let key = keys::habit_key(HabitState::Active, owner, habit_id);
            self.table.delete_item(&key, None).await.map_err(storage(OP))?;

            debug!(owner = %owner, habit_id = %habit_id, "deleted habit");
            Ok(())
        })
        .await
    }

    /// Move an active habit into the archived collection
    pub async fn archive_habit(&self, owner: &OwnerId, habit_id: &HabitId) -> Result<(), StoreError> {
        const OP: &str = "archive_habit";
        self.bounded(OP, self.move_habit(OP, owner, habit_id, HabitState::Active))
            .await
    }

    /// Move an archived habit back into the active collection
    pub async fn unarchive_habit(&self, owner: &OwnerId, habit_id: &HabitId) -> Result<(), StoreError> {
        const OP: &str = "unarchive_habit";
        self.bounded(OP, self.move_habit(OP, owner, habit_id, HabitState::Archived))
            .await
    }

    /// Record a check and increment the habit's counter in one transaction
    ///
    /// Fails with `Conflict` if the habit is already checked on `date`, and
    /// with `NotFound` if there is no active habit to count it against.
    pub async fn create_check(
        &self,
        owner: &OwnerId,
        habit_id: &HabitId,
        date: CheckDate,
    ) -> Result<Check, StoreError> {
        const OP: &str = "create_check";
        self.bounded(OP, async {
            let check = Check::new(owner.clone(), *habit_id, date, self.now());
            let item = CheckRecord::new(&check).into_item().map_err(storage(OP))?;
            let check_key = item.key();
            let habit_key = keys::habit_key(HabitState::Active, owner, habit_id);

            let result = self
                .table
                .transact_write(vec![
                    TransactWriteItem::Put {
                        item,
                        condition: Some(Condition::item_not_exists()),
                    },
                    TransactWriteItem::Update {
                        key: habit_key.clone(),
                        actions: vec![UpdateAction::Add(CHECKS_COUNT.to_string(), 1)],
                        condition: Some(Condition::item_exists()),
                    },
                ])
                .await;

            match result {
                Ok(()) => {
                    debug!(owner = %owner, habit_id = %habit_id, date = %date, "created check");
                    Ok(check)
                }
                Err(TableError::TransactionCanceled { reasons }) if failed(&reasons, 0) => {
                    warn!(owner = %owner, habit_id = %habit_id, date = %date, "check already exists");
                    Err(StoreError::Conflict {
                        operation: OP,
                        key: check_key.to_string(),
                    })
                }
                Err(TableError::TransactionCanceled { reasons }) if failed(&reasons, 1) => {
                    warn!(owner = %owner, habit_id = %habit_id, "no active habit to check");
                    Err(StoreError::NotFound {
                        operation: OP,
                        key: habit_key.to_string(),
                    })
                }
                Err(e) => Err(storage(OP)(e)),
            }
        })
        .await
    }

    /// Remove a check and decrement the habit's counter in one transaction
    pub async fn delete_check(
        &self,
        owner: &OwnerId,
        habit_id: &HabitId,
        date: CheckDate,
    ) -> Result<(), StoreError> {
        const OP: &str = "delete_check";
        self.bounded(OP, async {
            let check_key = keys::check_key(owner, habit_id, &date);
            let habit_key = keys::habit_key(HabitState::Active, owner, habit_id);

            let result = self
                .table
                .transact_write(vec![
                    TransactWriteItem::Delete {
                        key: check_key.clone(),
                        condition: Some(Condition::item_exists()),
                    },
                    TransactWriteItem::Update {
                        key: habit_key.clone(),
                        actions: vec![UpdateAction::Add(CHECKS_COUNT.to_string(), -1)],
                        condition: Some(Condition::item_exists()),
                    },
                ])
                .await;

            match result {
                Ok(()) => {
                    debug!(owner = %owner, habit_id = %habit_id, date = %date, "deleted check");
                    Ok(())
                }
                Err(TableError::TransactionCanceled { reasons }) if failed(&reasons, 0) => {
                    warn!(owner = %owner, habit_id = %habit_id, date = %date, "no check to delete");
                    Err(StoreError::NotFound {
                        operation: OP,
                        key: check_key.to_string(),
                    })
                }
                Err(TableError::TransactionCanceled { reasons }) if failed(&reasons, 1) => {
                    warn!(owner = %owner, habit_id = %habit_id, "no active habit to uncheck");
                    Err(StoreError::NotFound {
                        operation: OP,
                        key: habit_key.to_string(),
                    })
                }
                Err(e) => Err(storage(OP)(e)),
            }
        })
        .await
    }

    /// The newest `limit` checks of one habit, newest first
    pub async fn list_latest_checks(
        &self,
        owner: &OwnerId,
        habit_id: &HabitId,
        limit: u32,
    ) -> Result<Vec<Check>, StoreError> {
        const OP: &str = "list_latest_checks";
        if limit == 0 {
            return Err(DomainError::InvalidValue {
                message: "limit must be at least 1".to_string(),
            }
            .into());
        }

        self.bounded(OP, async {
            let mut input = QueryInput::new(
                keys::owner_partition(owner),
                SortCondition::BeginsWith(keys::check_prefix(habit_id)),
            )
            .reverse()
            .limit(limit);

            // Normally one page; more only if the backend pages below `limit`
            let mut checks = Vec::new();
            loop {
                let page = self.table.query(&input).await.map_err(storage(OP))?;
                for item in page.items {
                    checks.push(CheckRecord::decode(item)?);
                }

                let remaining = limit as usize - checks.len().min(limit as usize);
                match page.last_evaluated {
                    Some(token) if remaining > 0 => {
                        input.exclusive_start = Some(token);
                        input.limit = Some(remaining as u32);
                    }
                    _ => break,
                }
            }
            checks.truncate(limit as usize);
            Ok(checks)
        })
        .await
    }

    /// Checks of all the owner's habits dated within the last `window_days`
    /// days, oldest first
    ///
    /// The window is inclusive: with a 7 day window a check dated exactly
    /// 7 days before today is included.
    pub async fn list_recent_checks_across_habits(
        &self,
        owner: &OwnerId,
        window_days: u32,
    ) -> Result<Vec<Check>, StoreError> {
        const OP: &str = "list_recent_checks_across_habits";
        let since = self
            .now()
            .date_naive()
            .checked_sub_days(Days::new(u64::from(window_days)))
            .ok_or_else(|| DomainError::InvalidValue {
                message: format!("window of {window_days} days reaches before the calendar"),
            })?;
        let since = CheckDate::new(since)?;

        self.bounded(OP, async {
            let input = QueryInput::new(
                keys::owner_partition(owner),
                SortCondition::GreaterOrEqual(keys::check_index_lower_bound(&since)),
            )
            .on_index(CHECK_DATE_INDEX);

            self.query_all(OP, input)
                .await?
                .into_iter()
                .map(CheckRecord::decode)
                .collect()
        })
        .await
    }

    /// Run `work` under the request deadline
    ///
    /// Dropping the returned future abandons the wait as well.
    async fn bounded<R, F>(&self, operation: &'static str, work: F) -> Result<R, StoreError>
    where
        F: Future<Output = Result<R, StoreError>>,
    {
        match tokio::time::timeout(self.request_timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout = ?self.request_timeout, "store operation timed out");
                Err(StoreError::Timeout {
                    operation,
                    timeout: self.request_timeout,
                })
            }
        }
    }

    /// Read every page of a query
    async fn query_all(
        &self,
        operation: &'static str,
        mut input: QueryInput,
    ) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        loop {
            let page = self.table.query(&input).await.map_err(storage(operation))?;
            items.extend(page.items);
            match page.last_evaluated {
                Some(token) => input.exclusive_start = Some(token),
                None => return Ok(items),
            }
        }
    }

    async fn list_in(
        &self,
        operation: &'static str,
        owner: &OwnerId,
        state: HabitState,
    ) -> Result<Vec<Habit>, StoreError> {
        let input = QueryInput::new(
            keys::owner_partition(owner),
            SortCondition::BeginsWith(state.prefix().to_string()),
        );

        self.query_all(operation, input)
            .await?
            .into_iter()
            .map(|item| HabitRecord::decode(item, state))
            .collect()
    }

    async fn find_in(
        &self,
        operation: &'static str,
        owner: &OwnerId,
        habit_id: &HabitId,
        state: HabitState,
    ) -> Result<Habit, StoreError> {
        let key = keys::habit_key(state, owner, habit_id);
        match self.table.get_item(&key).await.map_err(storage(operation))? {
            Some(item) => HabitRecord::decode(item, state),
            None => Err(StoreError::NotFound {
                operation,
                key: key.to_string(),
            }),
        }
    }

    /// Delete the habit from the `from` collection and insert it into the
    /// other one, as a single transaction
    ///
    /// The delete only goes through if the stored habit still has the
    /// counter and title that were read, so a check or rename committed in
    /// between is never overwritten with stale values.
    async fn move_habit(
        &self,
        operation: &'static str,
        owner: &OwnerId,
        habit_id: &HabitId,
        from: HabitState,
    ) -> Result<(), StoreError> {
        let habit = self.find_in(operation, owner, habit_id, from).await?;
        let source = keys::habit_key(from, owner, habit_id);

        let moved = Habit {
            updated_at: self.now(),
            ..habit.clone()
        };
        let item = HabitRecord::new(&moved, from.toggled())
            .into_item()
            .map_err(storage(operation))?;
        let destination = item.key();

        let unchanged = Condition::All(vec![
            Condition::Equals(CHECKS_COUNT.to_string(), json!(habit.checks_count)),
            Condition::Equals(TITLE.to_string(), json!(habit.title.as_str())),
        ]);

        let result = self
            .table
            .transact_write(vec![
                TransactWriteItem::Delete {
                    key: source.clone(),
                    condition: Some(unchanged),
                },
                TransactWriteItem::Put {
                    item,
                    condition: Some(Condition::item_not_exists()),
                },
            ])
            .await;

        match result {
            Ok(()) => {
                debug!(owner = %owner, habit_id = %habit_id, from = ?from, "moved habit");
                Ok(())
            }
            Err(TableError::TransactionCanceled { reasons }) if failed(&reasons, 0) => {
                // Tell a vanished habit apart from one changed under us
                let still_there = self
                    .table
                    .get_item(&source)
                    .await
                    .map_err(storage(operation))?
                    .is_some();
                warn!(owner = %owner, habit_id = %habit_id, still_there, "habit changed before move");

                if still_there {
                    Err(StoreError::Conflict {
                        operation,
                        key: source.to_string(),
                    })
                } else {
                    Err(StoreError::NotFound {
                        operation,
                        key: source.to_string(),
                    })
                }
            }
            Err(TableError::TransactionCanceled { reasons }) if failed(&reasons, 1) => {
                Err(StoreError::Conflict {
                    operation,
                    key: destination.to_string(),
                })
            }
            Err(e) => Err(storage(operation)(e)),
        }
    }
}

fn storage(operation: &'static str) -> impl Fn(TableError) -> StoreError {
    move |source| StoreError::Storage { operation, source }
}

fn failed(reasons: &[CancellationReason], index: usize) -> bool {
    reasons.get(index) == Some(&CancellationReason::ConditionalCheckFailed)
}
