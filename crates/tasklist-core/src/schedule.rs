//! Next-task selection.
//!
//! Candidates are ranked by `(priority, parent_position, item_position,
//! item_id)`, lowest first:
//!
//! | Priority | Source |
//! |---|---|
//! | 1 | pending, unblocked children of an `in_progress` root |
//! | 2 | first pending, unblocked child of a pending, unblocked root |
//! | 3 | a pending, unblocked root without children |
//! | 4 | pending, unblocked items whose parent is already finished |
//!
//! Blocked items never become candidates.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use serde::Serialize;

use crate::graph::dependency::DependencyGraph;
use crate::graph::hierarchy::ListTree;
use crate::model::{Item, ItemId, Status};

// ---------------------------------------------------------------------------
// Priority / Candidate
// ---------------------------------------------------------------------------

/// Why an item was proposed. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Child of a root that is already in progress.
    ActiveParent = 1,
    /// Next child of a root that has not started.
    NextSubitem = 2,
    /// Root without children.
    Standalone = 3,
    /// Child left pending under a finished parent.
    Orphan = 4,
}

impl Priority {
    pub const fn rank(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rank())
    }
}

/// A schedulable item with its ranking tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub item: Item,
    pub priority: Priority,
    pub parent_position: u32,
    pub item_position: u32,
}

impl Candidate {
    fn new(item: &Item, priority: Priority, parent_position: u32, item_position: u32) -> Self {
        Self {
            item: item.clone(),
            priority,
            parent_position,
            item_position,
        }
    }

    pub const fn sort_key(&self) -> (Priority, u32, u32, ItemId) {
        (
            self.priority,
            self.parent_position,
            self.item_position,
            self.item.id,
        )
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

fn is_actionable(item: &Item, graph: &DependencyGraph) -> bool {
    item.status == Status::Pending && !graph.is_blocked(item.id)
}

/// Every candidate of the list, best first.
pub fn candidates(tree: &ListTree, graph: &DependencyGraph) -> Vec<Candidate> {
    let mut best: HashMap<ItemId, Candidate> = HashMap::new();
    let mut offer = |candidate: Candidate| match best.entry(candidate.item.id) {
        Entry::Occupied(mut slot) => {
            if candidate.sort_key() < slot.get().sort_key() {
                slot.insert(candidate);
            }
        }
        Entry::Vacant(slot) => {
            slot.insert(candidate);
        }
    };

    for root in tree.root_items() {
        match root.status {
            Status::InProgress => {
                for child in tree.children_of(root.id) {
                    if is_actionable(child, graph) {
                        offer(Candidate::new(
                            child,
                            Priority::ActiveParent,
                            root.position,
                            child.position,
                        ));
                    }
                }
            }
            Status::Pending if !graph.is_blocked(root.id) => {
                let children = tree.children_of(root.id);
                if children.is_empty() {
                    offer(Candidate::new(root, Priority::Standalone, root.position, 0));
                } else if let Some(child) =
                    children.into_iter().find(|child| is_actionable(child, graph))
                {
                    offer(Candidate::new(
                        child,
                        Priority::NextSubitem,
                        root.position,
                        child.position,
                    ));
                }
            }
            _ => {}
        }
    }

    for item in tree.items() {
        if !is_actionable(item, graph) {
            continue;
        }
        if let Some(parent) = tree.parent_of(item.id)
            && parent.status.is_finished()
        {
            offer(Candidate::new(
                item,
                Priority::Orphan,
                parent.position,
                item.position,
            ));
        }
    }

    let mut ranked: Vec<Candidate> = best.into_values().collect();
    ranked.sort_by_key(Candidate::sort_key);
    ranked
}

/// The best candidate, or `None` when nothing is actionable.
pub fn select_next(tree: &ListTree, graph: &DependencyGraph) -> Option<Item> {
    let next = candidates(tree, graph).into_iter().next();
    match &next {
        Some(candidate) => tracing::debug!(
            item = %candidate.item.key,
            priority = %candidate.priority,
            "selected next task"
        ),
        None => tracing::debug!(list = %tree.list_id(), "no actionable task"),
    }
    next.map(|candidate| candidate.item)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependencyEdge, DependencyKind, ListId};
    use std::collections::BTreeMap;

    fn item(id: i64, key: &str, position: u32, parent: Option<i64>, status: Status) -> Item {
        Item {
            id: ItemId(id),
            list_id: ListId(1),
            key: key.to_string(),
            content: key.to_string(),
            position,
            status,
            parent_id: parent.map(ItemId),
            completion_states: BTreeMap::new(),
            started_at_us: None,
            completed_at_us: None,
            created_at_us: 0,
            updated_at_us: 0,
        }
    }

    fn tree(items: Vec<Item>) -> ListTree {
        ListTree::build(ListId(1), items).expect("tree")
    }

    fn graph_for(tree: &ListTree, edges: &[(i64, i64)]) -> DependencyGraph {
        DependencyGraph::from_parts(
            edges.iter().map(|&(d, r)| DependencyEdge {
                dependent: ItemId(d),
                required: ItemId(r),
                kind: DependencyKind::Requires,
                created_at_us: 0,
            }),
            tree.items().iter().map(|i| (i.id, i.status)).collect(),
        )
    }

    fn ranked_keys(tree: &ListTree, graph: &DependencyGraph) -> Vec<String> {
        candidates(tree, graph)
            .into_iter()
            .map(|c| format!("{}@{}", c.item.key, c.priority))
            .collect()
    }

    #[test]
    fn active_parent_children_come_first() {
        let t = tree(vec![
            item(1, "A", 1, None, Status::InProgress),
            item(2, "A1", 1, Some(1), Status::Pending),
            item(3, "A2", 2, Some(1), Status::Pending),
            item(4, "B", 2, None, Status::Pending),
        ]);
        let g = graph_for(&t, &[]);
        assert_eq!(
            ranked_keys(&t, &g),
            ["A1@1", "A2@1", "B@3"]
        );
        assert_eq!(select_next(&t, &g).map(|i| i.key), Some("A1".into()));
    }

    #[test]
    fn pending_root_offers_only_first_open_child() {
        let t = tree(vec![
            item(1, "A", 1, None, Status::Pending),
            item(2, "A1", 1, Some(1), Status::Completed),
            item(3, "A2", 2, Some(1), Status::Pending),
            item(4, "A3", 3, Some(1), Status::Pending),
        ]);
        let g = graph_for(&t, &[]);
        assert_eq!(ranked_keys(&t, &g), ["A2@2"]);
    }

    #[test]
    fn blocked_items_are_skipped() {
        let t = tree(vec![
            item(1, "A", 1, None, Status::Pending),
            item(2, "B", 2, None, Status::Pending),
        ]);
        let g = graph_for(&t, &[(1, 2)]);
        assert_eq!(ranked_keys(&t, &g), ["B@3"]);
    }

    #[test]
    fn blocked_root_hides_its_children() {
        let t = tree(vec![
            item(1, "A", 1, None, Status::Pending),
            item(2, "A1", 1, Some(1), Status::Pending),
            item(3, "B", 2, None, Status::InProgress),
        ]);
        let g = graph_for(&t, &[(1, 3)]);
        assert!(candidates(&t, &g).is_empty());
        assert!(select_next(&t, &g).is_none());
    }

    #[test]
    fn orphans_rank_last() {
        let t = tree(vec![
            item(1, "A", 1, None, Status::Completed),
            item(2, "A1", 1, Some(1), Status::Pending),
            item(3, "B", 2, None, Status::Pending),
        ]);
        let g = graph_for(&t, &[]);
        assert_eq!(ranked_keys(&t, &g), ["B@3", "A1@4"]);
    }

    #[test]
    fn nested_orphan_uses_parent_position() {
        let t = tree(vec![
            item(1, "A", 1, None, Status::InProgress),
            item(2, "A1", 4, Some(1), Status::Failed),
            item(3, "A1a", 2, Some(2), Status::Pending),
        ]);
        let g = graph_for(&t, &[]);
        let ranked = candidates(&t, &g);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].priority, Priority::Orphan);
        assert_eq!((ranked[0].parent_position, ranked[0].item_position), (4, 2));
    }
}
