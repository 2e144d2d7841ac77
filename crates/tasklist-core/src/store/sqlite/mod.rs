//! SQLite storage backend.
//!
//! Runtime defaults are intentionally conservative:
//! - `journal_mode = WAL` to allow concurrent readers while a writer commits
//! - `busy_timeout = 5s` to reduce transient lock failures under contention
//! - `foreign_keys = ON` so item and list deletion cascades to edges
//!
//! Transactions are SQLite savepoints, which gives nesting for free: the
//! outermost savepoint behaves like `BEGIN`/`COMMIT`.

pub mod migrations;
pub mod schema;

use anyhow::{Context, Result, anyhow};
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use super::Store;
use crate::model::{
    DependencyEdge, DependencyKind, Item, ItemId, ItemUpdate, ListId, ListType, NewItem, NewList,
    TaskList,
};

/// Busy timeout used when the caller does not configure one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ITEM_COLUMNS: &str = "item_id, list_id, item_key, content, position, status, parent_id, \
                            completion_states, started_at_us, completed_at_us, \
                            created_at_us, updated_at_us";

const LIST_COLUMNS: &str = "list_id, list_key, title, list_type, created_at_us, updated_at_us";

const EDGE_COLUMNS: &str = "dependent_item_id, required_item_id, kind, created_at_us";

/// Durable [`Store`] over a single SQLite connection.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    depth: u32,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, apply runtime pragmas, and
    /// migrate the schema to the latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if opening, configuring, or migrating fails.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create database directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("open database {}", path.display()))?;
        Self::from_connection(conn, busy_timeout)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate or migrate the database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        Self::from_connection(conn, DEFAULT_BUSY_TIMEOUT)
    }

    fn from_connection(mut conn: Connection, busy_timeout: Duration) -> Result<Self> {
        configure_connection(&conn, busy_timeout).context("configure sqlite pragmas")?;
        let version = migrations::migrate(&mut conn).context("apply schema migrations")?;
        tracing::debug!(schema_version = version, "sqlite store ready");
        Ok(Self { conn, depth: 0 })
    }

    /// Underlying connection, for diagnostics and tests.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    fn query_items(&self, sql: &str, args: &[&dyn ToSql], what: &str) -> Result<Vec<Item>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("prepare {what}"))?;
        let rows = stmt
            .query_map(args, row_to_item)
            .with_context(|| format!("execute {what}"))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row.with_context(|| format!("read {what} row"))?);
        }
        Ok(items)
    }

    fn query_edges(&self, sql: &str, args: &[&dyn ToSql], what: &str) -> Result<Vec<DependencyEdge>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("prepare {what}"))?;
        let rows = stmt
            .query_map(args, row_to_edge)
            .with_context(|| format!("execute {what}"))?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row.with_context(|| format!("read {what} row"))?);
        }
        Ok(edges)
    }

    fn require_item(&self, id: ItemId) -> Result<Item> {
        self.get_item_by_id(id)?
            .ok_or_else(|| anyhow!("item {id} does not exist"))
    }
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

impl Store for SqliteStore {
    fn insert_list(&mut self, new: &NewList) -> Result<TaskList> {
        self.conn
            .execute(
                "INSERT INTO lists (list_key, title, list_type, created_at_us, updated_at_us) \
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![new.key, new.title, new.list_type.as_str(), new.created_at_us],
            )
            .with_context(|| format!("insert list '{}'", new.key))?;

        let id = ListId(self.conn.last_insert_rowid());
        self.get_list_by_id(id)?
            .ok_or_else(|| anyhow!("list {id} vanished after insert"))
    }

    fn get_list(&self, key: &str) -> Result<Option<TaskList>> {
        let sql = format!("SELECT {LIST_COLUMNS} FROM lists WHERE list_key = ?1");
        self.conn
            .query_row(&sql, params![key], row_to_list)
            .optional()
            .with_context(|| format!("get_list for '{key}'"))
    }

    fn get_list_by_id(&self, id: ListId) -> Result<Option<TaskList>> {
        let sql = format!("SELECT {LIST_COLUMNS} FROM lists WHERE list_id = ?1");
        self.conn
            .query_row(&sql, params![id.0], row_to_list)
            .optional()
            .with_context(|| format!("get_list_by_id for {id}"))
    }

    fn all_lists(&self) -> Result<Vec<TaskList>> {
        let sql = format!("SELECT {LIST_COLUMNS} FROM lists ORDER BY list_key");
        let mut stmt = self.conn.prepare(&sql).context("prepare all_lists")?;
        let rows = stmt.query_map([], row_to_list).context("execute all_lists")?;

        let mut lists = Vec::new();
        for row in rows {
            lists.push(row.context("read list row")?);
        }
        Ok(lists)
    }

    fn delete_list(&mut self, id: ListId) -> Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM lists WHERE list_id = ?1", params![id.0])
            .with_context(|| format!("delete list {id}"))?;
        if removed == 0 {
            return Err(anyhow!("list {id} does not exist"));
        }
        Ok(())
    }

    fn insert_item(&mut self, new: &NewItem) -> Result<Item> {
        self.conn
            .execute(
                "INSERT INTO items \
                 (list_id, item_key, content, position, status, parent_id, \
                  completion_states, created_at_us, updated_at_us) \
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, '{}', ?6, ?6)",
                params![
                    new.list_id.0,
                    new.key,
                    new.content,
                    new.position,
                    new.parent_id.map(|id| id.0),
                    new.created_at_us,
                ],
            )
            .with_context(|| format!("insert item '{}'", new.key))?;

        self.require_item(ItemId(self.conn.last_insert_rowid()))
    }

    fn get_item(&self, list_id: ListId, key: &str) -> Result<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE list_id = ?1 AND item_key = ?2");
        self.conn
            .query_row(&sql, params![list_id.0, key], row_to_item)
            .optional()
            .with_context(|| format!("get_item for '{key}'"))
    }

    fn get_item_by_id(&self, id: ItemId) -> Result<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE item_id = ?1");
        self.conn
            .query_row(&sql, params![id.0], row_to_item)
            .optional()
            .with_context(|| format!("get_item_by_id for {id}"))
    }

    fn list_items(&self, list_id: ListId) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE list_id = ?1 ORDER BY position, item_id"
        );
        self.query_items(&sql, &[&list_id.0], "list_items")
    }

    fn children_of(&self, parent_id: ItemId) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE parent_id = ?1 ORDER BY position, item_id"
        );
        self.query_items(&sql, &[&parent_id.0], "children_of")
    }

    fn root_items(&self, list_id: ListId) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE list_id = ?1 AND parent_id IS NULL ORDER BY position, item_id"
        );
        self.query_items(&sql, &[&list_id.0], "root_items")
    }

    fn update_item(&mut self, id: ItemId, update: &ItemUpdate) -> Result<Item> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(content) = &update.content {
            assignments.push("content");
            values.push(Box::new(content.clone()));
        }
        if let Some(status) = update.status {
            assignments.push("status");
            values.push(Box::new(status.as_str()));
        }
        if let Some(position) = update.position {
            assignments.push("position");
            values.push(Box::new(position));
        }
        if let Some(parent_id) = update.parent_id {
            assignments.push("parent_id");
            values.push(Box::new(parent_id.map(|p| p.0)));
        }
        if let Some(states) = &update.completion_states {
            let json = serde_json::to_string(states).context("encode completion_states")?;
            assignments.push("completion_states");
            values.push(Box::new(json));
        }
        if let Some(started) = update.started_at_us {
            assignments.push("started_at_us");
            values.push(Box::new(started));
        }
        if let Some(completed) = update.completed_at_us {
            assignments.push("completed_at_us");
            values.push(Box::new(completed));
        }
        assignments.push("updated_at_us");
        values.push(Box::new(update.updated_at_us));

        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(idx, column)| format!("{column} = ?{}", idx + 1))
            .collect::<Vec<_>>()
            .join(", ");
        values.push(Box::new(id.0));
        let sql = format!(
            "UPDATE items SET {set_clause} WHERE item_id = ?{}",
            values.len()
        );

        let changed = self
            .conn
            .execute(&sql, params_from_iter(values.iter()))
            .with_context(|| format!("update item {id}"))?;
        if changed == 0 {
            return Err(anyhow!("item {id} does not exist"));
        }
        self.require_item(id)
    }

    fn delete_item(&mut self, id: ItemId) -> Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM items WHERE item_id = ?1", params![id.0])
            .with_context(|| format!("delete item {id}"))?;
        if removed == 0 {
            return Err(anyhow!("item {id} does not exist"));
        }
        Ok(())
    }

    fn dependency_edges_for(&self, item_id: ItemId) -> Result<Vec<DependencyEdge>> {
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM item_dependencies \
             WHERE dependent_item_id = ?1 OR required_item_id = ?1 \
             ORDER BY dependent_item_id, required_item_id"
        );
        self.query_edges(&sql, &[&item_id.0], "dependency_edges_for")
    }

    fn all_dependency_edges(&self) -> Result<Vec<DependencyEdge>> {
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM item_dependencies \
             ORDER BY dependent_item_id, required_item_id"
        );
        self.query_edges(&sql, &[], "all_dependency_edges")
    }

    fn add_dependency_edge(&mut self, edge: &DependencyEdge) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO item_dependencies \
                 (dependent_item_id, required_item_id, kind, created_at_us) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT (dependent_item_id, required_item_id) DO UPDATE SET kind = excluded.kind",
                params![
                    edge.dependent.0,
                    edge.required.0,
                    edge.kind.as_str(),
                    edge.created_at_us
                ],
            )
            .with_context(|| {
                format!(
                    "insert dependency {} -> {}",
                    edge.dependent, edge.required
                )
            })?;
        Ok(())
    }

    fn remove_dependency_edge(&mut self, dependent: ItemId, required: ItemId) -> Result<bool> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM item_dependencies \
                 WHERE dependent_item_id = ?1 AND required_item_id = ?2",
                params![dependent.0, required.0],
            )
            .with_context(|| format!("remove dependency {dependent} -> {required}"))?;
        Ok(removed > 0)
    }

    fn within_transaction<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        self.depth += 1;
        let savepoint = format!("tasklist_tx_{}", self.depth);

        if let Err(error) = self.conn.execute_batch(&format!("SAVEPOINT {savepoint}")) {
            self.depth -= 1;
            return Err(E::from(anyhow::Error::new(error).context("begin transaction")));
        }

        let result = f(self);

        let finish = if result.is_ok() {
            self.conn
                .execute_batch(&format!("RELEASE {savepoint}"))
                .context("commit transaction")
        } else {
            Ok(())
        };

        let outcome = match (result, finish) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(commit_error)) => {
                self.rollback_savepoint(&savepoint);
                Err(E::from(commit_error))
            }
            (Err(error), _) => {
                self.rollback_savepoint(&savepoint);
                Err(error)
            }
        };
        self.depth -= 1;
        outcome
    }
}

impl SqliteStore {
    fn rollback_savepoint(&self, savepoint: &str) {
        if let Err(error) = self
            .conn
            .execute_batch(&format!("ROLLBACK TO {savepoint}; RELEASE {savepoint}"))
        {
            tracing::error!(savepoint, error = %error, "failed to roll back transaction");
        }
    }
}

fn parse_column<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

fn row_to_list(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskList> {
    let list_type: String = row.get(3)?;
    Ok(TaskList {
        id: ListId(row.get(0)?),
        key: row.get(1)?,
        title: row.get(2)?,
        list_type: parse_column::<ListType>(3, &list_type)?,
        created_at_us: row.get(4)?,
        updated_at_us: row.get(5)?,
    })
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    let status: String = row.get(5)?;
    let states_json: String = row.get(7)?;
    let completion_states: BTreeMap<String, String> = serde_json::from_str(&states_json)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(error)))?;

    Ok(Item {
        id: ItemId(row.get(0)?),
        list_id: ListId(row.get(1)?),
        key: row.get(2)?,
        content: row.get(3)?,
        position: row.get(4)?,
        status: parse_column(5, &status)?,
        parent_id: row.get::<_, Option<i64>>(6)?.map(ItemId),
        completion_states,
        started_at_us: row.get(8)?,
        completed_at_us: row.get(9)?,
        created_at_us: row.get(10)?,
        updated_at_us: row.get(11)?,
    })
}

fn row_to_edge(row: &rusqlite::Row<'_>) -> rusqlite::Result<DependencyEdge> {
    let kind: String = row.get(2)?;
    Ok(DependencyEdge {
        dependent: ItemId(row.get(0)?),
        required: ItemId(row.get(1)?),
        kind: parse_column::<DependencyKind>(2, &kind)?,
        created_at_us: row.get(3)?,
    })
}
