//! Parent/child containment model for the items of one list.
//!
//! A [`ListTree`] is an arena: items live in a flat `Vec`, addressed through
//! an id→index map, with a per-node children index and the list of roots.
//! It is a read-only snapshot; load it again after mutating the store.
//!
//! # Invariants checked on construction
//!
//! - every `parent_id` references an item of the same list
//! - parent pointers contain no loop (every item is reachable from a root)
//!
//! A violation means stored data broke an engine invariant and is reported as
//! [`EngineError::Consistency`].

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::{HashMap, VecDeque};

use crate::error::{EngineError, Result};
use crate::model::{Item, ItemId, ListId};
use crate::store::Store;

// ---------------------------------------------------------------------------
// ListTree
// ---------------------------------------------------------------------------

/// Arena snapshot of a list's hierarchy.
#[derive(Debug, Clone)]
pub struct ListTree {
    list_id: ListId,
    items: Vec<Item>,
    index: HashMap<ItemId, usize>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl ListTree {
    /// Build the arena from every item of `list_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Consistency`] if an item belongs to another
    /// list, references a missing or foreign parent, or sits on a parent loop.
    pub fn build(list_id: ListId, mut items: Vec<Item>) -> Result<Self> {
        items.sort_by_key(|item| (item.position, item.id));

        let mut index = HashMap::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            if item.list_id != list_id {
                return Err(EngineError::Consistency(format!(
                    "item {} belongs to list {} while loading list {list_id}",
                    item.id, item.list_id
                )));
            }
            if index.insert(item.id, idx).is_some() {
                return Err(EngineError::Consistency(format!(
                    "item {} appears twice in list {list_id}",
                    item.id
                )));
            }
        }

        let mut parent = vec![None; items.len()];
        let mut children = vec![Vec::new(); items.len()];
        let mut roots = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            match item.parent_id {
                None => roots.push(idx),
                Some(parent_id) => {
                    let Some(&parent_idx) = index.get(&parent_id) else {
                        return Err(EngineError::Consistency(format!(
                            "parent {parent_id} of item {} is not in list {list_id}",
                            item.id
                        )));
                    };
                    parent[idx] = Some(parent_idx);
                    // `items` is already in (position, id) order, so children
                    // inherit that order.
                    children[parent_idx].push(idx);
                }
            }
        }

        let tree = Self {
            list_id,
            items,
            index,
            parent,
            children,
            roots,
        };
        tree.ensure_acyclic()?;
        Ok(tree)
    }

    /// Load and build the tree for `list_id` from a store.
    ///
    /// # Errors
    ///
    /// Returns a storage error if reading fails, or a consistency error as
    /// described in [`ListTree::build`].
    pub fn load<S: Store + ?Sized>(store: &S, list_id: ListId) -> Result<Self> {
        let items = store.list_items(list_id)?;
        Self::build(list_id, items)
    }

    fn ensure_acyclic(&self) -> Result<()> {
        let reachable = self.walk_from(&self.roots);
        if reachable.len() == self.items.len() {
            return Ok(());
        }

        let mut seen = vec![false; self.items.len()];
        for idx in reachable {
            seen[idx] = true;
        }
        let stuck: Vec<String> = self
            .items
            .iter()
            .zip(seen)
            .filter(|(_, seen)| !seen)
            .map(|(item, _)| item.key.clone())
            .collect();
        Err(EngineError::Consistency(format!(
            "parent loop in list {}: {}",
            self.list_id,
            stuck.join(", ")
        )))
    }

    /// Breadth-first arena indices reachable from `start` (inclusive).
    fn walk_from(&self, start: &[usize]) -> Vec<usize> {
        let mut order = Vec::new();
        let mut queue: VecDeque<usize> = start.iter().copied().collect();
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            queue.extend(self.children[idx].iter().copied());
        }
        order
    }

    fn idx(&self, id: ItemId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub const fn list_id(&self) -> ListId {
        self.list_id
    }

    /// Every item, ordered by `(position, id)`.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.idx(id).map(|idx| &self.items[idx])
    }

    /// Direct children in sibling order. Empty for unknown ids.
    pub fn children_of(&self, id: ItemId) -> Vec<&Item> {
        self.idx(id).map_or_else(Vec::new, |idx| {
            self.children[idx].iter().map(|&c| &self.items[c]).collect()
        })
    }

    /// Items without a parent, in sibling order.
    pub fn root_items(&self) -> Vec<&Item> {
        self.roots.iter().map(|&idx| &self.items[idx]).collect()
    }

    pub fn parent_of(&self, id: ItemId) -> Option<&Item> {
        let idx = self.idx(id)?;
        self.parent[idx].map(|p| &self.items[p])
    }

    /// Number of edges between the item and its root (roots are depth 0).
    pub fn depth_of(&self, id: ItemId) -> Option<usize> {
        let mut current = self.idx(id)?;
        let mut depth = 0;
        while let Some(parent) = self.parent[current] {
            depth += 1;
            current = parent;
        }
        Some(depth)
    }

    /// Deepest depth in the list, `0` for an empty or flat list.
    pub fn max_depth(&self) -> usize {
        let mut max = 0;
        let mut frontier: Vec<(usize, usize)> = self.roots.iter().map(|&r| (r, 0)).collect();
        while let Some((idx, depth)) = frontier.pop() {
            max = max.max(depth);
            frontier.extend(self.children[idx].iter().map(|&c| (c, depth + 1)));
        }
        max
    }

    /// Ancestors of the item, nearest first.
    pub fn ancestors(&self, id: ItemId) -> Vec<&Item> {
        let mut out = Vec::new();
        let Some(mut current) = self.idx(id) else {
            return out;
        };
        while let Some(parent) = self.parent[current] {
            out.push(&self.items[parent]);
            current = parent;
        }
        out
    }

    /// Returns `true` if `candidate` sits strictly below `ancestor`.
    pub fn is_descendant(&self, candidate: ItemId, ancestor: ItemId) -> bool {
        self.ancestors(candidate)
            .iter()
            .any(|item| item.id == ancestor)
    }

    /// The item followed by all its descendants, breadth first.
    pub fn subtree(&self, id: ItemId) -> Vec<&Item> {
        self.idx(id).map_or_else(Vec::new, |idx| {
            self.walk_from(&[idx])
                .into_iter()
                .map(|i| &self.items[i])
                .collect()
        })
    }
}

// ---------------------------------------------------------------------------
// Reparent validation
// ---------------------------------------------------------------------------

/// Check that `item` may be placed under `new_parent`.
///
/// Rules: same list, not the item itself, and `new_parent` is not one of the
/// item's descendants.
///
/// # Errors
///
/// Returns [`EngineError::InvalidHierarchy`] when a rule is broken.
pub fn validate_reparent(tree: &ListTree, item: &Item, new_parent: &Item) -> Result<()> {
    let reject = |reason: &str| EngineError::InvalidHierarchy {
        item: item.key.clone(),
        parent: new_parent.key.clone(),
        reason: reason.to_string(),
    };

    if item.list_id != new_parent.list_id || new_parent.list_id != tree.list_id() {
        return Err(reject("parent belongs to a different list"));
    }
    if item.id == new_parent.id {
        return Err(reject("an item cannot be its own parent"));
    }
    if tree.is_descendant(new_parent.id, item.id) {
        return Err(reject("parent is a descendant of the item"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
