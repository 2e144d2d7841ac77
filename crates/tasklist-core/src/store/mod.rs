//! Storage port and its adapters.
//!
//! The engine never talks to a database directly. Everything it reads or
//! writes goes through [`Store`], and every compound operation is wrapped in
//! [`Store::within_transaction`] so that either the whole unit of work is
//! visible or none of it is.
//!
//! ## Adapters
//!
//! - [`memory::MemoryStore`] is `BTreeMap`-backed with snapshot/restore
//!   transactions. Used by tests and short-lived sessions.
//! - [`sqlite::SqliteStore`] is a durable `rusqlite` store with migrations and
//!   savepoint-based (nestable) transactions.
//!
//! Read methods return rows ordered deterministically: items by
//! `(position, id)`, lists by key, edges by `(dependent, required)`.

pub mod memory;
pub mod sqlite;

use anyhow::Result;

use crate::model::{
    DependencyEdge, Item, ItemId, ItemUpdate, ListId, NewItem, NewList, TaskList,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// CRUD access to lists, items, and dependency edges plus an atomic unit of
/// work.
///
/// Adapters do not enforce engine invariants beyond what their schema gives
/// for free (unique keys, referential integrity). Hierarchy, acyclicity and
/// status rules live in the engine.
pub trait Store {
    fn insert_list(&mut self, new: &NewList) -> Result<TaskList>;
    fn get_list(&self, key: &str) -> Result<Option<TaskList>>;
    fn get_list_by_id(&self, id: ListId) -> Result<Option<TaskList>>;
    fn all_lists(&self) -> Result<Vec<TaskList>>;
    /// Remove a list together with its items and their incident edges.
    fn delete_list(&mut self, id: ListId) -> Result<()>;

    fn insert_item(&mut self, new: &NewItem) -> Result<Item>;
    fn get_item(&self, list_id: ListId, key: &str) -> Result<Option<Item>>;
    fn get_item_by_id(&self, id: ItemId) -> Result<Option<Item>>;
    /// All items of a list, parents and children alike.
    fn list_items(&self, list_id: ListId) -> Result<Vec<Item>>;
    fn children_of(&self, parent_id: ItemId) -> Result<Vec<Item>>;
    fn root_items(&self, list_id: ListId) -> Result<Vec<Item>>;
    /// Apply a partial update and return the stored row.
    ///
    /// Fails if the item does not exist.
    fn update_item(&mut self, id: ItemId, update: &ItemUpdate) -> Result<Item>;
    /// Remove an item, its descendants, and every edge incident to them.
    fn delete_item(&mut self, id: ItemId) -> Result<()>;

    /// Edges where `item_id` is either the dependent or the required side.
    fn dependency_edges_for(&self, item_id: ItemId) -> Result<Vec<DependencyEdge>>;
    fn all_dependency_edges(&self) -> Result<Vec<DependencyEdge>>;
    /// Insert an edge, or update the kind if the ordered pair already exists.
    fn add_dependency_edge(&mut self, edge: &DependencyEdge) -> Result<()>;
    /// Returns `true` if an edge was removed.
    fn remove_dependency_edge(&mut self, dependent: ItemId, required: ItemId) -> Result<bool>;

    /// Run `f` as one atomic unit: commit on `Ok`, roll back on `Err`.
    ///
    /// Calls may nest; an inner failure only rolls back the inner unit, and
    /// the outer unit decides what happens to the rest.
    fn within_transaction<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<anyhow::Error>;
}
