/// Wide-column table protocol the habit store is written against
///
/// A table holds items addressed by a partition key (`PK`) and a sort key
/// (`SK`). Within one partition, items can be range-scanned by sort key or
/// by the sort key of a local secondary index. Writes are single-item
/// (optionally conditional) or grouped into an all-or-nothing transaction.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Attribute holding the partition key of every item
pub const PARTITION_KEY: &str = "PK";

/// Attribute holding the sort key of every item
pub const SORT_KEY: &str = "SK";

/// Maximum number of operations in one transaction
pub const MAX_TRANSACT_ITEMS: usize = 100;

/// Errors reported by a table backend
#[derive(Error, Debug)]
pub enum TableError {
    #[error("conditional check failed")]
    ConditionalCheckFailed,

    #[error("transaction canceled, reasons: {reasons:?}")]
    TransactionCanceled { reasons: Vec<CancellationReason> },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Why one operation of a cancelled transaction was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    /// The operation itself was fine; another one failed
    None,
    ConditionalCheckFailed,
}

/// Composite primary key of an item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub pk: String,
    pub sk: String,
}

impl Key {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}

/// A stored item: an attribute map that always carries `PK` and `SK`
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    attributes: Map<String, Value>,
}

impl Item {
    /// Wrap an attribute map, checking that both key attributes are strings
    pub fn from_attributes(attributes: Map<String, Value>) -> Result<Self, TableError> {
        for name in [PARTITION_KEY, SORT_KEY] {
            match attributes.get(name) {
                Some(Value::String(s)) if !s.is_empty() => {}
                _ => {
                    return Err(TableError::Validation(format!(
                        "item attribute {name} must be a non-empty string"
                    )))
                }
            }
        }
        Ok(Self { attributes })
    }

    pub fn key(&self) -> Key {
        Key::new(self.pk(), self.sk())
    }

    pub fn pk(&self) -> &str {
        self.get_str(PARTITION_KEY).unwrap_or_default()
    }

    pub fn sk(&self) -> &str {
        self.get_str(SORT_KEY).unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn into_attributes(self) -> Map<String, Value> {
        self.attributes
    }
}

/// A local secondary index: same partition key, alternate sort key attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIndex {
    pub name: String,
    pub sort_key: String,
}

/// Name and index layout of one logical table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub local_index: Option<LocalIndex>,
}

/// Condition applied to the sort key (or index sort key) in a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortCondition {
    BeginsWith(String),
    GreaterOrEqual(String),
}

/// Where a paginated query left off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken {
    /// Primary sort key of the last returned item
    pub sk: String,
    /// Index sort key of the last returned item, for index queries
    pub index_sk: Option<String>,
}

/// One page worth of query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInput {
    pub pk: String,
    pub sort: SortCondition,
    /// Query a local secondary index instead of the primary sort key
    pub index: Option<String>,
    /// Maximum number of items in the page
    pub limit: Option<u32>,
    /// Ascending sort-key order when true, descending otherwise
    pub scan_forward: bool,
    pub exclusive_start: Option<PageToken>,
}

impl QueryInput {
    pub fn new(pk: impl Into<String>, sort: SortCondition) -> Self {
        Self {
            pk: pk.into(),
            sort,
            index: None,
            limit: None,
            scan_forward: true,
            exclusive_start: None,
        }
    }

    pub fn on_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn reverse(mut self) -> Self {
        self.scan_forward = false;
        self
    }
}

/// A page of query results
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    /// Set when more items may follow; pass it back as `exclusive_start`
    pub last_evaluated: Option<PageToken>,
}

/// Predicate over the current state of the item a write targets
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    AttributeExists(String),
    AttributeNotExists(String),
    Equals(String, Value),
    All(Vec<Condition>),
}

impl Condition {
    /// The targeted item exists
    pub fn item_exists() -> Self {
        Condition::AttributeExists(PARTITION_KEY.to_string())
    }

    /// No item is stored at the targeted key
    pub fn item_not_exists() -> Self {
        Condition::AttributeNotExists(PARTITION_KEY.to_string())
    }

    /// Evaluate against the current item, `None` when nothing is stored
    pub fn evaluate(&self, current: Option<&Map<String, Value>>) -> bool {
        match self {
            Condition::AttributeExists(name) => current.is_some_and(|m| m.contains_key(name)),
            Condition::AttributeNotExists(name) => !current.is_some_and(|m| m.contains_key(name)),
            Condition::Equals(name, value) => current.and_then(|m| m.get(name)) == Some(value),
            Condition::All(conditions) => conditions.iter().all(|c| c.evaluate(current)),
        }
    }
}

/// Attribute change applied by an update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    Set(String, Value),
    /// Add to a numeric attribute; a missing attribute counts as zero
    Add(String, i64),
}

/// One operation of a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum TransactWriteItem {
    Put {
        item: Item,
        condition: Option<Condition>,
    },
    Delete {
        key: Key,
        condition: Option<Condition>,
    },
    Update {
        key: Key,
        actions: Vec<UpdateAction>,
        condition: Option<Condition>,
    },
}

impl TransactWriteItem {
    pub fn condition(&self) -> Option<&Condition> {
        match self {
            TransactWriteItem::Put { condition, .. }
            | TransactWriteItem::Delete { condition, .. }
            | TransactWriteItem::Update { condition, .. } => condition.as_ref(),
        }
    }

    pub fn key(&self) -> Key {
        match self {
            TransactWriteItem::Put { item, .. } => item.key(),
            TransactWriteItem::Delete { key, .. } | TransactWriteItem::Update { key, .. } => {
                key.clone()
            }
        }
    }
}

/// Storage backend protocol
///
/// Implementations must make `transact_write` atomic: either every
/// operation takes effect or none does.
#[async_trait]
pub trait Table: Send + Sync {
    /// Point read by exact key
    async fn get_item(&self, key: &Key) -> Result<Option<Item>, TableError>;

    /// Read one page of items from a partition
    async fn query(&self, input: &QueryInput) -> Result<QueryPage, TableError>;

    async fn put_item(&self, item: Item, condition: Option<Condition>) -> Result<(), TableError>;

    async fn delete_item(&self, key: &Key, condition: Option<Condition>) -> Result<(), TableError>;

    /// Apply attribute changes, creating the item when it doesn't exist yet
    async fn update_item(
        &self,
        key: &Key,
        actions: Vec<UpdateAction>,
        condition: Option<Condition>,
    ) -> Result<(), TableError>;

    async fn transact_write(&self, items: Vec<TransactWriteItem>) -> Result<(), TableError>;
}
