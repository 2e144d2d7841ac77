//! Directed dependency graph between items.
//!
//! # Overview
//!
//! An edge `dependent → required` means the dependent item is not available
//! until the required item is `completed`. Edges may cross lists; the graph
//! treats every [`ItemId`] uniformly. Both dependency kinds gate
//! availability in the same way, so the snapshot keeps only the endpoints.
//!
//! The graph is a snapshot: it carries the status of every item that touches
//! an edge at load time. Build it again after mutating the store.
//!
//! # Blocking
//!
//! An item is **blocked** if at least one of its required items is not
//! completed. A required item whose status is unknown (for example because
//! it is missing from the snapshot) counts as blocking.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{EngineError, Result};
use crate::model::{DependencyEdge, ItemId, Status};
use crate::store::Store;

// ---------------------------------------------------------------------------
// DependencyGraph
// ---------------------------------------------------------------------------

/// Snapshot of the dependency edges plus the statuses of their endpoints.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// dependent → required
    requires: BTreeMap<ItemId, BTreeSet<ItemId>>,
    /// required → dependents
    required_by: BTreeMap<ItemId, BTreeSet<ItemId>>,
    statuses: HashMap<ItemId, Status>,
}

impl DependencyGraph {
    /// Build a graph from explicit edges and endpoint statuses.
    pub fn from_parts(
        edges: impl IntoIterator<Item = DependencyEdge>,
        statuses: HashMap<ItemId, Status>,
    ) -> Self {
        let mut graph = Self {
            statuses,
            ..Self::default()
        };
        for edge in edges {
            graph.insert(edge.dependent, edge.required);
        }
        graph
    }

    /// Load every stored edge and the status of each endpoint.
    ///
    /// # Errors
    ///
    /// Storage errors pass through. An edge whose endpoint the store no
    /// longer has is an [`EngineError::Consistency`].
    pub fn load<S: Store + ?Sized>(store: &S) -> Result<Self> {
        let edges = store.all_dependency_edges()?;

        let mut statuses = HashMap::new();
        for edge in &edges {
            for id in [edge.dependent, edge.required] {
                if statuses.contains_key(&id) {
                    continue;
                }
                let item = store.get_item_by_id(id)?.ok_or_else(|| {
                    EngineError::Consistency(format!(
                        "dependency edge {} -> {} references missing item {id}",
                        edge.dependent, edge.required
                    ))
                })?;
                statuses.insert(id, item.status);
            }
        }

        Ok(Self::from_parts(edges, statuses))
    }

    fn insert(&mut self, dependent: ItemId, required: ItemId) {
        self.requires.entry(dependent).or_default().insert(required);
        self.required_by
            .entry(required)
            .or_default()
            .insert(dependent);
    }

    pub fn status_of(&self, id: ItemId) -> Option<Status> {
        self.statuses.get(&id).copied()
    }

    fn is_completed(&self, id: ItemId) -> bool {
        self.status_of(id) == Some(Status::Completed)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Returns `true` if any required item of `id` is not completed.
    pub fn is_blocked(&self, id: ItemId) -> bool {
        self.requires
            .get(&id)
            .is_some_and(|required| required.iter().any(|&r| !self.is_completed(r)))
    }

    /// Direct required items of `id` that are not completed.
    pub fn blockers_of(&self, id: ItemId) -> Vec<ItemId> {
        self.requires.get(&id).map_or_else(Vec::new, |required| {
            required
                .iter()
                .copied()
                .filter(|&r| !self.is_completed(r))
                .collect()
        })
    }

    /// Direct dependents held back by `id`; empty once `id` is completed.
    pub fn blocked_by(&self, id: ItemId) -> Vec<ItemId> {
        if self.is_completed(id) {
            return Vec::new();
        }
        self.dependents_of(id)
    }

    fn dependents_of(&self, id: ItemId) -> Vec<ItemId> {
        self.required_by
            .get(&id)
            .map_or_else(Vec::new, |deps| deps.iter().copied().collect())
    }

    /// Required items of `id`, without kinds. Used by traversals.
    pub(crate) fn required_ids(&self, id: ItemId) -> impl Iterator<Item = ItemId> + '_ {
        self.requires
            .get(&id)
            .into_iter()
            .flat_map(|required| required.iter().copied())
    }

    /// Every item that touches at least one edge, in ascending id order.
    pub fn all_item_ids(&self) -> Vec<ItemId> {
        let ids: BTreeSet<ItemId> = self
            .requires
            .keys()
            .chain(self.required_by.keys())
            .copied()
            .collect();
        ids.into_iter().collect()
    }

    pub fn edge_count(&self) -> usize {
        self.requires.values().map(BTreeSet::len).sum()
    }
}

/// Check whether a single item is blocked by reading only its own edges.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn is_item_blocked<S: Store + ?Sized>(store: &S, id: ItemId) -> anyhow::Result<bool> {
    for edge in store.dependency_edges_for(id)? {
        if edge.dependent != id {
            continue;
        }
        let completed = store
            .get_item_by_id(edge.required)?
            .is_some_and(|item| item.status == Status::Completed);
        if !completed {
            return Ok(true);
        }
    }
    Ok(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
