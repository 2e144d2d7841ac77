//! Per-list progress statistics.

use serde::Serialize;

use crate::graph::dependency::DependencyGraph;
use crate::graph::hierarchy::ListTree;
use crate::model::Status;

/// Counts for one list. `blocked` only counts pending items;
/// `available = pending - blocked`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListProgress {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub blocked: usize,
    pub available: usize,
    pub root_items: usize,
    pub subitems: usize,
    pub max_depth: usize,
    pub exceeds_recommended_depth: bool,
}

impl ListProgress {
    /// Aggregate a loaded tree against the dependency snapshot.
    #[must_use]
    pub fn compute(tree: &ListTree, graph: &DependencyGraph, recommended_max_depth: usize) -> Self {
        let mut progress = Self {
            total: tree.len(),
            root_items: tree.root_items().len(),
            max_depth: tree.max_depth(),
            ..Self::default()
        };
        progress.subitems = progress.total - progress.root_items;
        progress.exceeds_recommended_depth = progress.max_depth > recommended_max_depth;

        for item in tree.items() {
            match item.status {
                Status::Pending => {
                    progress.pending += 1;
                    if graph.is_blocked(item.id) {
                        progress.blocked += 1;
                    }
                }
                Status::InProgress => progress.in_progress += 1,
                Status::Completed => progress.completed += 1,
                Status::Failed => progress.failed += 1,
            }
        }
        progress.available = progress.pending - progress.blocked;
        progress
    }

    /// Share of completed items in percent; `100.0` for an empty list.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 * 100.0 / self.total as f64
    }
}
