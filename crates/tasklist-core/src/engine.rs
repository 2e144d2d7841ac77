//! Engine facade: the operations presentation layers call.
//!
//! Every mutating operation runs inside one [`Store::within_transaction`]
//! unit, so a failure anywhere (validation, propagation, storage) leaves the
//! store exactly as it was. Reads work on fresh snapshots of the hierarchy
//! and the dependency graph.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::graph::cycles::{self, CyclePath};
use crate::graph::dependency::{self, DependencyGraph};
use crate::graph::hierarchy::{self, ListTree};
use crate::model::{
    DependencyEdge, DependencyKind, Item, ItemId, ItemUpdate, ListType, NewItem, NewList, Status,
    TaskList, now_us,
};
use crate::progress::ListProgress;
use crate::propagate::{self, StatusChange};
use crate::schedule::{self, Candidate};
use crate::status;
use crate::store::Store;

/// Outcome of [`Engine::delete_item`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    /// The item itself plus its descendants.
    pub removed_items: usize,
    /// Dependency edges that touched any removed item.
    pub removed_edges: usize,
    /// Status rewrites of the former parent chain.
    pub propagated: Vec<StatusChange>,
}

/// Task consistency and scheduling engine over a [`Store`].
#[derive(Debug)]
pub struct Engine<S: Store> {
    store: S,
    config: EngineConfig,
}

impl<S: Store> Engine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub const fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn write<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut S, &EngineConfig) -> Result<T>,
    ) -> Result<T> {
        let config = &self.config;
        let result = self.store.within_transaction(|store| f(store, config));
        if let Err(error) = &result {
            report_failure(op, error);
        }
        result
    }

    fn read<T>(&self, op: &'static str, f: impl FnOnce(&S, &EngineConfig) -> Result<T>) -> Result<T> {
        let result = f(&self.store, &self.config);
        if let Err(error) = &result {
            report_failure(op, error);
        }
        result
    }

    // -----------------------------------------------------------------------
    // Lists
    // -----------------------------------------------------------------------

    /// Create an empty list.
    ///
    /// # Errors
    ///
    /// [`EngineError::DuplicateKey`] if the key is taken.
    pub fn create_list(&mut self, key: &str, title: &str, list_type: ListType) -> Result<TaskList> {
        self.write("create_list", |store, _| {
            if store.get_list(key)?.is_some() {
                return Err(EngineError::DuplicateKey {
                    entity: "list",
                    key: key.to_string(),
                });
            }
            let list = store.insert_list(&NewList {
                key: key.to_string(),
                title: title.to_string(),
                list_type,
                created_at_us: now_us(),
            })?;
            tracing::info!(list = %list.key, list_type = %list.list_type, "created list");
            Ok(list)
        })
    }

    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown key.
    pub fn list(&self, key: &str) -> Result<TaskList> {
        self.read("list", |store, _| find_list(store, key))
    }

    /// # Errors
    ///
    /// Storage errors only.
    pub fn lists(&self) -> Result<Vec<TaskList>> {
        self.read("lists", |store, _| Ok(store.all_lists()?))
    }

    /// Delete a list with all its items and their dependency edges.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown key.
    pub fn delete_list(&mut self, key: &str) -> Result<()> {
        self.write("delete_list", |store, _| {
            let list = find_list(store, key)?;
            store.delete_list(list.id)?;
            tracing::info!(list = %list.key, "deleted list");
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Append an item to the list, optionally under `parent`.
    ///
    /// The item goes after its last sibling. Adding never changes the
    /// parent's status.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown list or parent,
    /// [`EngineError::DuplicateKey`] if the key exists in the list.
    pub fn add_item(
        &mut self,
        list_key: &str,
        key: &str,
        content: &str,
        parent: Option<&str>,
    ) -> Result<Item> {
        self.write("add_item", |store, config| {
            let list = find_list(store, list_key)?;
            if store.get_item(list.id, key)?.is_some() {
                return Err(EngineError::DuplicateKey {
                    entity: "item",
                    key: format!("{list_key}/{key}"),
                });
            }

            let parent = parent
                .map(|parent_key| find_item(store, &list, parent_key))
                .transpose()?;
            let siblings = match &parent {
                Some(parent) => store.children_of(parent.id)?,
                None => store.root_items(list.id)?,
            };

            let item = store.insert_item(&NewItem {
                list_id: list.id,
                key: key.to_string(),
                content: content.to_string(),
                position: next_position(&siblings),
                parent_id: parent.as_ref().map(|p| p.id),
                created_at_us: now_us(),
            })?;

            if item.parent_id.is_some() {
                warn_if_deep(store, config, &list, &item)?;
            }
            tracing::info!(
                list = %list.key,
                item = %item.key,
                parent = parent.as_ref().map_or("", |p| p.key.as_str()),
                position = item.position,
                "added item"
            );
            Ok(item)
        })
    }

    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown list or item.
    pub fn item(&self, list_key: &str, key: &str) -> Result<Item> {
        self.read("item", |store, _| {
            let list = find_list(store, list_key)?;
            find_item(store, &list, key)
        })
    }

    /// Every item of the list ordered by `(position, id)`.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown list.
    pub fn items(&self, list_key: &str) -> Result<Vec<Item>> {
        self.read("items", |store, _| {
            let list = find_list(store, list_key)?;
            Ok(store.list_items(list.id)?)
        })
    }

    /// Load the list's hierarchy snapshot.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown list, or a consistency error
    /// if the stored hierarchy is broken.
    pub fn tree(&self, list_key: &str) -> Result<ListTree> {
        self.read("tree", |store, _| {
            let list = find_list(store, list_key)?;
            ListTree::load(store, list.id)
        })
    }

    /// Move an item under `parent_key`, after the parent's last child.
    ///
    /// The former parent's chain and the new parent's chain are both
    /// recomputed in the same transaction. A former parent left without
    /// children keeps its status.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidHierarchy`] if the parent is the item itself or
    /// one of its descendants, [`EngineError::NotFound`] for unknown keys.
    pub fn convert_to_subitem(&mut self, list_key: &str, key: &str, parent_key: &str) -> Result<Item> {
        self.write("convert_to_subitem", |store, config| {
            let list = find_list(store, list_key)?;
            let item = find_item(store, &list, key)?;
            let parent = find_item(store, &list, parent_key)?;
            if item.parent_id == Some(parent.id) {
                return Ok(item);
            }

            let tree = ListTree::load(store, list.id)?;
            hierarchy::validate_reparent(&tree, &item, &parent)?;

            let now = now_us();
            let siblings = store.children_of(parent.id)?;
            let moved = store.update_item(
                item.id,
                &ItemUpdate {
                    parent_id: Some(Some(parent.id)),
                    position: Some(next_position(&siblings)),
                    ..ItemUpdate::touch(now)
                },
            )?;

            // Both chains must agree with their children again.
            let mut propagated = match item.parent_id {
                Some(old_parent) => propagate::recompute_from(store, list.id, old_parent, now)?,
                None => Vec::new(),
            };
            propagated.extend(propagate::recompute_from(store, list.id, parent.id, now)?);

            warn_if_deep(store, config, &list, &moved)?;
            tracing::info!(
                list = %list.key,
                item = %moved.key,
                parent = %parent.key,
                propagated = propagated.len(),
                "converted to subitem"
            );
            Ok(moved)
        })
    }

    /// Delete an item and its subtree, then recompute the former parent.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for unknown keys; propagation errors roll the
    /// deletion back.
    pub fn delete_item(&mut self, list_key: &str, key: &str) -> Result<DeleteSummary> {
        self.write("delete_item", |store, _| {
            let list = find_list(store, list_key)?;
            let item = find_item(store, &list, key)?;

            let tree = ListTree::load(store, list.id)?;
            let removed: Vec<ItemId> = tree.subtree(item.id).iter().map(|i| i.id).collect();
            let removed_edges = store
                .all_dependency_edges()?
                .iter()
                .filter(|edge| removed.contains(&edge.dependent) || removed.contains(&edge.required))
                .count();

            store.delete_item(item.id)?;

            let propagated = match item.parent_id {
                Some(parent_id) => propagate::recompute_from(store, list.id, parent_id, now_us())?,
                None => Vec::new(),
            };

            tracing::info!(
                list = %list.key,
                item = %item.key,
                removed_items = removed.len(),
                removed_edges,
                "deleted item"
            );
            Ok(DeleteSummary {
                removed_items: removed.len(),
                removed_edges,
                propagated,
            })
        })
    }

    /// Record an informational completion marker on an item.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for unknown keys.
    pub fn set_completion_state(
        &mut self,
        list_key: &str,
        key: &str,
        name: &str,
        value: &str,
    ) -> Result<Item> {
        self.write("set_completion_state", |store, _| {
            let list = find_list(store, list_key)?;
            let item = find_item(store, &list, key)?;
            let mut states = item.completion_states.clone();
            states.insert(name.to_string(), value.to_string());
            let updated = store.update_item(
                item.id,
                &ItemUpdate {
                    completion_states: Some(states),
                    ..ItemUpdate::touch(now_us())
                },
            )?;
            tracing::debug!(item = %updated.key, name, value, "set completion state");
            Ok(updated)
        })
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    /// Move an item to `target` and propagate to its ancestors.
    ///
    /// # Errors
    ///
    /// [`EngineError::IncompleteChildren`] when completing an item with
    /// unfinished children without `force`. Propagation failures roll back
    /// the item's own change as well.
    pub fn update_status(
        &mut self,
        list_key: &str,
        key: &str,
        target: Status,
        force: bool,
    ) -> Result<Item> {
        self.write("update_status", |store, _| {
            let list = find_list(store, list_key)?;
            let item = find_item(store, &list, key)?;
            let children = store.children_of(item.id)?;
            let child_refs: Vec<&Item> = children.iter().collect();
            status::check_transition(&item, &child_refs, target, force).map_err(|error| {
                match error {
                    EngineError::IncompleteChildren {
                        incomplete, total, ..
                    } => EngineError::IncompleteChildren {
                        item: format!("{}/{}", list.key, item.key),
                        incomplete,
                        total,
                    },
                    other => other,
                }
            })?;

            let now = now_us();
            let updated = store.update_item(item.id, &status::transition_update(&item, target, now))?;
            let changes = propagate::propagate_from(store, &updated, now)?;

            tracing::info!(
                list = %list.key,
                item = %updated.key,
                from = %item.status,
                to = %updated.status,
                forced = force,
                propagated = changes.len(),
                "updated status"
            );
            Ok(updated)
        })
    }

    /// Re-run ancestor recomputation starting at the item's parent.
    ///
    /// On a consistent tree this changes nothing.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for unknown keys; consistency errors from a
    /// broken ancestor chain.
    pub fn propagate(&mut self, list_key: &str, key: &str) -> Result<Vec<StatusChange>> {
        self.write("propagate", |store, _| {
            let list = find_list(store, list_key)?;
            let item = find_item(store, &list, key)?;
            propagate::propagate_from(store, &item, now_us())
        })
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// The next actionable item of the list, if any.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown list.
    pub fn schedule_next(&self, list_key: &str) -> Result<Option<Item>> {
        self.read("schedule_next", |store, _| {
            let (tree, graph) = snapshot(store, list_key)?;
            Ok(schedule::select_next(&tree, &graph))
        })
    }

    /// Every candidate of the list, best first.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown list.
    pub fn candidates(&self, list_key: &str) -> Result<Vec<Candidate>> {
        self.read("candidates", |store, _| {
            let (tree, graph) = snapshot(store, list_key)?;
            Ok(schedule::candidates(&tree, &graph))
        })
    }

    // -----------------------------------------------------------------------
    // Dependencies
    // -----------------------------------------------------------------------

    /// Make `dependent` wait for `required`. Items may live in different
    /// lists. Re-adding an existing pair updates its kind.
    ///
    /// # Errors
    ///
    /// [`EngineError::CycleDetected`] if the edge would close a loop (the
    /// stored graph is unchanged), [`EngineError::NotFound`] for unknown keys.
    pub fn add_dependency(
        &mut self,
        dependent_list: &str,
        dependent_key: &str,
        required_list: &str,
        required_key: &str,
        kind: DependencyKind,
    ) -> Result<DependencyEdge> {
        self.write("add_dependency", |store, _| {
            let dependent = resolve(store, dependent_list, dependent_key)?;
            let required = resolve(store, required_list, required_key)?;

            let graph = DependencyGraph::load(store)?;
            if let Some(cycle) = cycles::detect_cycle_on_add(&graph, dependent.id, required.id) {
                let path = cycle
                    .path
                    .iter()
                    .map(|&id| label_of(store, id))
                    .collect::<Result<Vec<_>>>()?;
                return Err(EngineError::CycleDetected {
                    dependent: format!("{dependent_list}/{dependent_key}"),
                    required: format!("{required_list}/{required_key}"),
                    path,
                });
            }

            let edge = DependencyEdge {
                dependent: dependent.id,
                required: required.id,
                kind,
                created_at_us: now_us(),
            };
            store.add_dependency_edge(&edge)?;
            tracing::info!(
                dependent = %format!("{dependent_list}/{dependent_key}"),
                required = %format!("{required_list}/{required_key}"),
                kind = %kind,
                "added dependency"
            );
            Ok(edge)
        })
    }

    /// Remove the edge if present. Returns whether one was removed.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for unknown keys.
    pub fn remove_dependency(
        &mut self,
        dependent_list: &str,
        dependent_key: &str,
        required_list: &str,
        required_key: &str,
    ) -> Result<bool> {
        self.write("remove_dependency", |store, _| {
            let dependent = resolve(store, dependent_list, dependent_key)?;
            let required = resolve(store, required_list, required_key)?;
            let removed = store.remove_dependency_edge(dependent.id, required.id)?;
            if removed {
                tracing::info!(
                    dependent = %format!("{dependent_list}/{dependent_key}"),
                    required = %format!("{required_list}/{required_key}"),
                    "removed dependency"
                );
            }
            Ok(removed)
        })
    }

    /// # Errors
    ///
    /// [`EngineError::NotFound`] for unknown keys.
    pub fn is_blocked(&self, list_key: &str, key: &str) -> Result<bool> {
        self.read("is_blocked", |store, _| {
            let item = resolve(store, list_key, key)?;
            Ok(dependency::is_item_blocked(store, item.id)?)
        })
    }

    /// Required items of `key` that are not completed yet.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for unknown keys.
    pub fn blockers_of(&self, list_key: &str, key: &str) -> Result<Vec<Item>> {
        self.read("blockers_of", |store, _| {
            let item = resolve(store, list_key, key)?;
            let graph = DependencyGraph::load(store)?;
            items_by_id(store, graph.blockers_of(item.id))
        })
    }

    /// Dependents held back by `key`; empty once `key` is completed.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for unknown keys.
    pub fn blocked_by(&self, list_key: &str, key: &str) -> Result<Vec<Item>> {
        self.read("blocked_by", |store, _| {
            let item = resolve(store, list_key, key)?;
            let graph = DependencyGraph::load(store)?;
            items_by_id(store, graph.blocked_by(item.id))
        })
    }

    /// Every edge touching `key`, in either direction.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for unknown keys.
    pub fn dependencies(&self, list_key: &str, key: &str) -> Result<Vec<DependencyEdge>> {
        self.read("dependencies", |store, _| {
            let item = resolve(store, list_key, key)?;
            Ok(store.dependency_edges_for(item.id)?)
        })
    }

    /// `list/key` label of an item id, as used in error messages.
    ///
    /// # Errors
    ///
    /// Consistency error if the item or its list is missing.
    pub fn label(&self, id: ItemId) -> Result<String> {
        self.read("label", |store, _| label_of(store, id))
    }

    // -----------------------------------------------------------------------
    // Reporting
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown list.
    pub fn progress(&self, list_key: &str) -> Result<ListProgress> {
        self.read("progress", |store, config| {
            let (tree, graph) = snapshot(store, list_key)?;
            Ok(ListProgress::compute(
                &tree,
                &graph,
                config.hierarchy.recommended_max_depth,
            ))
        })
    }

    /// Audit the stored data: every list's hierarchy must load cleanly and
    /// the dependency graph is searched for loops.
    ///
    /// # Errors
    ///
    /// A consistency error for a broken hierarchy; storage errors.
    pub fn verify(&self) -> Result<Vec<CyclePath>> {
        self.read("verify", |store, _| {
            for list in store.all_lists()? {
                ListTree::load(store, list.id)?;
            }
            let graph = DependencyGraph::load(store)?;
            if !cycles::has_cycles(&graph) {
                tracing::debug!(edges = graph.edge_count(), "dependency graph is acyclic");
                return Ok(Vec::new());
            }
            let found = cycles::find_all_cycles(&graph);
            tracing::error!(cycles = found.len(), "dependency graph contains cycles");
            Ok(found)
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn report_failure(op: &'static str, error: &EngineError) {
    match error {
        EngineError::Consistency(_) | EngineError::Storage(_) => {
            tracing::error!(op, code = %error.code(), error = %error, "operation failed and was rolled back");
        }
        _ => tracing::debug!(op, code = %error.code(), error = %error, "operation rejected"),
    }
}

fn find_list<S: Store>(store: &S, key: &str) -> Result<TaskList> {
    store
        .get_list(key)?
        .ok_or_else(|| EngineError::list_not_found(key))
}

fn find_item<S: Store>(store: &S, list: &TaskList, key: &str) -> Result<Item> {
    store
        .get_item(list.id, key)?
        .ok_or_else(|| EngineError::item_not_found(&list.key, key))
}

fn resolve<S: Store>(store: &S, list_key: &str, key: &str) -> Result<Item> {
    let list = find_list(store, list_key)?;
    find_item(store, &list, key)
}

fn label_of<S: Store>(store: &S, id: ItemId) -> Result<String> {
    let item = store
        .get_item_by_id(id)?
        .ok_or_else(|| EngineError::Consistency(format!("item {id} is missing")))?;
    let list = store.get_list_by_id(item.list_id)?.ok_or_else(|| {
        EngineError::Consistency(format!("list {} of item {id} is missing", item.list_id))
    })?;
    Ok(format!("{}/{}", list.key, item.key))
}

fn items_by_id<S: Store>(store: &S, ids: Vec<ItemId>) -> Result<Vec<Item>> {
    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(item) = store.get_item_by_id(id)? {
            items.push(item);
        }
    }
    Ok(items)
}

fn snapshot<S: Store>(store: &S, list_key: &str) -> Result<(ListTree, DependencyGraph)> {
    let list = find_list(store, list_key)?;
    let tree = ListTree::load(store, list.id)?;
    let graph = DependencyGraph::load(store)?;
    Ok((tree, graph))
}

fn next_position(siblings: &[Item]) -> u32 {
    siblings
        .iter()
        .map(|item| item.position)
        .max()
        .map_or(1, |last| last.saturating_add(1))
}

fn warn_if_deep<S: Store>(store: &S, config: &EngineConfig, list: &TaskList, item: &Item) -> Result<()> {
    let tree = ListTree::load(store, list.id)?;
    let depth = tree.depth_of(item.id).unwrap_or_default();
    if depth > config.hierarchy.recommended_max_depth {
        tracing::warn!(
            list = %list.key,
            item = %item.key,
            depth,
            recommended = config.hierarchy.recommended_max_depth,
            "item is nested deeper than recommended"
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
