/// SQLite implementation of the wide-column table protocol
///
/// Items of every logical table live in the one `items` relation, keyed by
/// `(table_name, pk, sk)`. The full attribute map is stored as JSON, while
/// the key attributes and the local index sort key are copied into columns
/// so range scans run on a B-tree index. SQLite's default BINARY collation
/// compares strings byte-wise, which is the order sort keys are scanned in.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde_json::{Map, Value};

use crate::storage::migrations;
use crate::storage::table::{
    CancellationReason, Condition, Item, Key, PageToken, QueryInput, QueryPage, SortCondition,
    Table, TableDefinition, TableError, TransactWriteItem, UpdateAction, MAX_TRANSACT_ITEMS,
    PARTITION_KEY, SORT_KEY,
};

/// Items returned per query page unless the caller asks for fewer
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// SQLite-backed table
///
/// The connection is shared behind a mutex and every call runs on the
/// blocking thread pool, so async callers never stall the runtime.
/// Cloning is cheap and the clones share the connection.
#[derive(Clone)]
pub struct SqliteTable {
    conn: Arc<Mutex<Connection>>,
    definition: Arc<TableDefinition>,
    page_size: usize,
}

impl SqliteTable {
    /// Open (creating if needed) a database file and bind to one table in it
    pub fn open(db_path: &Path, definition: TableDefinition) -> Result<Self, TableError> {
        let conn = Connection::open(db_path)?;

        // Another process may hold the write lock briefly
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;

        let table = Self::from_connection(conn, definition)?;
        tracing::info!(
            table = %table.definition.name,
            "SQLite table opened at: {}",
            db_path.display()
        );
        Ok(table)
    }

    /// Open a private in-memory database, mostly for tests
    pub fn open_in_memory(definition: TableDefinition) -> Result<Self, TableError> {
        Self::from_connection(Connection::open_in_memory()?, definition)
    }

    fn from_connection(conn: Connection, definition: TableDefinition) -> Result<Self, TableError> {
        migrations::initialize_database(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            definition: Arc::new(definition),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Cap the number of items returned per query page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Bind another logical table on the same database connection
    pub fn sibling(&self, definition: TableDefinition) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            definition: Arc::new(definition),
            page_size: self.page_size,
        }
    }

    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Run `f` against the locked connection on the blocking pool
    async fn with_conn<F, R>(&self, f: F) -> Result<R, TableError>
    where
        F: FnOnce(&mut Connection, &TableDefinition) -> Result<R, TableError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let definition = Arc::clone(&self.definition);

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| TableError::Unavailable("connection mutex poisoned".to_string()))?;
            f(&mut *guard, &*definition)
        })
        .await
        .map_err(|e| TableError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl Table for SqliteTable {
    async fn get_item(&self, key: &Key) -> Result<Option<Item>, TableError> {
        let key = key.clone();
        self.with_conn(move |conn, definition| {
            load(conn, &definition.name, &key)?
                .map(Item::from_attributes)
                .transpose()
        })
        .await
    }

    async fn query(&self, input: &QueryInput) -> Result<QueryPage, TableError> {
        let input = input.clone();
        let page_size = self.page_size;
        self.with_conn(move |conn, definition| query_page(conn, definition, page_size, &input))
            .await
    }

    async fn put_item(&self, item: Item, condition: Option<Condition>) -> Result<(), TableError> {
        self.with_conn(move |conn, definition| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = load(&tx, &definition.name, &item.key())?;
            ensure(condition.as_ref(), current.as_ref())?;
            store(&tx, definition, item.attributes())?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete_item(&self, key: &Key, condition: Option<Condition>) -> Result<(), TableError> {
        let key = key.clone();
        self.with_conn(move |conn, definition| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = load(&tx, &definition.name, &key)?;
            ensure(condition.as_ref(), current.as_ref())?;
            remove(&tx, &definition.name, &key)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn update_item(
        &self,
        key: &Key,
        actions: Vec<UpdateAction>,
        condition: Option<Condition>,
    ) -> Result<(), TableError> {
        let key = key.clone();
        self.with_conn(move |conn, definition| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = load(&tx, &definition.name, &key)?;
            ensure(condition.as_ref(), current.as_ref())?;
            let updated = apply_update(&key, current, &actions)?;
            store(&tx, definition, &updated)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn transact_write(&self, items: Vec<TransactWriteItem>) -> Result<(), TableError> {
        if items.is_empty() || items.len() > MAX_TRANSACT_ITEMS {
            return Err(TableError::Validation(format!(
                "a transaction takes 1 to {MAX_TRANSACT_ITEMS} operations, got {}",
                items.len()
            )));
        }

        let mut seen = HashSet::with_capacity(items.len());
        for op in &items {
            let key = op.key();
            if !seen.insert(key.clone()) {
                return Err(TableError::Validation(format!(
                    "transaction targets {key} more than once"
                )));
            }
        }

        self.with_conn(move |conn, definition| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            // Evaluate every condition before writing anything
            let mut reasons = Vec::with_capacity(items.len());
            let mut states = Vec::with_capacity(items.len());
            for op in &items {
                let current = load(&tx, &definition.name, &op.key())?;
                let passed = op.condition().map_or(true, |c| c.evaluate(current.as_ref()));
                reasons.push(if passed {
                    CancellationReason::None
                } else {
                    CancellationReason::ConditionalCheckFailed
                });
                states.push(current);
            }

            if reasons.contains(&CancellationReason::ConditionalCheckFailed) {
                // Dropping the transaction rolls it back
                return Err(TableError::TransactionCanceled { reasons });
            }

            for (op, current) in items.into_iter().zip(states) {
                match op {
                    TransactWriteItem::Put { item, .. } => {
                        store(&tx, definition, item.attributes())?;
                    }
                    TransactWriteItem::Delete { key, .. } => {
                        remove(&tx, &definition.name, &key)?;
                    }
                    TransactWriteItem::Update { key, actions, .. } => {
                        let updated = apply_update(&key, current, &actions)?;
                        store(&tx, definition, &updated)?;
                    }
                }
            }

            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn ensure(condition: Option<&Condition>, current: Option<&Map<String, Value>>) -> Result<(), TableError> {
    match condition {
        Some(condition) if !condition.evaluate(current) => Err(TableError::ConditionalCheckFailed),
        _ => Ok(()),
    }
}

/// Read the attribute map stored at `key`
fn load(conn: &Connection, table: &str, key: &Key) -> Result<Option<Map<String, Value>>, TableError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT attributes FROM items WHERE table_name = ?1 AND pk = ?2 AND sk = ?3",
            params![table, key.pk, key.sk],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Insert or replace an item, refreshing its index column
fn store(conn: &Connection, definition: &TableDefinition, attributes: &Map<String, Value>) -> Result<(), TableError> {
    let key_attr = |name: &str| -> Result<String, TableError> {
        match attributes.get(name) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            _ => Err(TableError::Validation(format!(
                "item attribute {name} must be a non-empty string"
            ))),
        }
    };
    let pk = key_attr(PARTITION_KEY)?;
    let sk = key_attr(SORT_KEY)?;

    let lsi_sk = match &definition.local_index {
        Some(index) => match attributes.get(&index.sort_key) {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(TableError::Validation(format!(
                    "index sort key {} must be a string",
                    index.sort_key
                )))
            }
        },
        None => None,
    };

    conn.execute(
        "INSERT OR REPLACE INTO items (table_name, pk, sk, lsi_sk, attributes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            definition.name,
            pk,
            sk,
            lsi_sk,
            serde_json::to_string(attributes)?
        ],
    )?;
    Ok(())
}

fn remove(conn: &Connection, table: &str, key: &Key) -> Result<(), TableError> {
    conn.execute(
        "DELETE FROM items WHERE table_name = ?1 AND pk = ?2 AND sk = ?3",
        params![table, key.pk, key.sk],
    )?;
    Ok(())
}

/// Apply update actions to the current attributes, starting from a bare
/// key when nothing is stored yet
fn apply_update(
    key: &Key,
    current: Option<Map<String, Value>>,
    actions: &[UpdateAction],
) -> Result<Map<String, Value>, TableError> {
    let mut attributes = current.unwrap_or_else(|| {
        let mut fresh = Map::new();
        fresh.insert(PARTITION_KEY.to_string(), Value::String(key.pk.clone()));
        fresh.insert(SORT_KEY.to_string(), Value::String(key.sk.clone()));
        fresh
    });

    for action in actions {
        let name = match action {
            UpdateAction::Set(name, _) | UpdateAction::Add(name, _) => name,
        };
        if name == PARTITION_KEY || name == SORT_KEY {
            return Err(TableError::Validation(format!(
                "key attribute {name} cannot be updated"
            )));
        }

        match action {
            UpdateAction::Set(name, value) => {
                attributes.insert(name.clone(), value.clone());
            }
            UpdateAction::Add(name, delta) => {
                let current = match attributes.get(name) {
                    None => 0,
                    Some(value) => value.as_i64().ok_or_else(|| {
                        TableError::Validation(format!("attribute {name} is not an integer"))
                    })?,
                };
                let sum = current.checked_add(*delta).ok_or_else(|| {
                    TableError::Validation(format!("attribute {name} would overflow"))
                })?;
                attributes.insert(name.clone(), Value::from(sum));
            }
        }
    }

    Ok(attributes)
}

/// Read one page of a partition, on the primary sort key or the local index
fn query_page(
    conn: &Connection,
    definition: &TableDefinition,
    page_size: usize,
    input: &QueryInput,
) -> Result<QueryPage, TableError> {
    let on_index = match &input.index {
        None => false,
        Some(name) => match &definition.local_index {
            Some(index) if &index.name == name => true,
            _ => {
                return Err(TableError::Validation(format!(
                    "table {} has no index named {name}",
                    definition.name
                )))
            }
        },
    };

    let page_len = match input.limit {
        Some(0) => {
            return Err(TableError::Validation("query limit must be at least 1".to_string()))
        }
        Some(limit) => (limit as usize).min(page_size),
        None => page_size,
    };

    let column = if on_index { "lsi_sk" } else { "sk" };
    let mut sql = String::from("SELECT sk, lsi_sk, attributes FROM items WHERE table_name = ? AND pk = ?");
    let mut values = vec![
        SqlValue::Text(definition.name.clone()),
        SqlValue::Text(input.pk.clone()),
    ];

    if on_index {
        // Items without the index attribute are not part of the index
        sql.push_str(" AND lsi_sk IS NOT NULL");
    }

    match &input.sort {
        SortCondition::BeginsWith(prefix) => {
            sql.push_str(&format!(" AND substr({column}, 1, ?) = ?"));
            values.push(SqlValue::Integer(prefix.chars().count() as i64));
            values.push(SqlValue::Text(prefix.clone()));
        }
        SortCondition::GreaterOrEqual(bound) => {
            sql.push_str(&format!(" AND {column} >= ?"));
            values.push(SqlValue::Text(bound.clone()));
        }
    }

    let (cmp, dir) = if input.scan_forward { (">", "ASC") } else { ("<", "DESC") };

    if let Some(start) = &input.exclusive_start {
        if on_index {
            let index_sk = start.index_sk.clone().ok_or_else(|| {
                TableError::Validation("index page token lacks the index sort key".to_string())
            })?;
            sql.push_str(&format!(" AND (lsi_sk {cmp} ? OR (lsi_sk = ? AND sk {cmp} ?))"));
            values.push(SqlValue::Text(index_sk.clone()));
            values.push(SqlValue::Text(index_sk));
            values.push(SqlValue::Text(start.sk.clone()));
        } else {
            sql.push_str(&format!(" AND sk {cmp} ?"));
            values.push(SqlValue::Text(start.sk.clone()));
        }
    }

    if on_index {
        sql.push_str(&format!(" ORDER BY lsi_sk {dir}, sk {dir}"));
    } else {
        sql.push_str(&format!(" ORDER BY sk {dir}"));
    }

    // One extra row tells whether another page follows
    sql.push_str(" LIMIT ?");
    values.push(SqlValue::Integer(page_len as i64 + 1));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let has_more = rows.len() > page_len;
    rows.truncate(page_len);

    let last_evaluated = if has_more {
        rows.last().map(|(sk, lsi_sk, _)| PageToken {
            sk: sk.clone(),
            index_sk: if on_index { lsi_sk.clone() } else { None },
        })
    } else {
        None
    };

    let items = rows
        .into_iter()
        .map(|(_, _, raw)| -> Result<Item, TableError> {
            Item::from_attributes(serde_json::from_str(&raw)?)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QueryPage {
        items,
        last_evaluated,
    })
}
