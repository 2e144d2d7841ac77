//! Cycle detection for the dependency graph.
//!
//! # Overview
//!
//! Dependency edges must stay acyclic: an item in a loop waits on itself and
//! can never become available. [`detect_cycle_on_add`] runs before every
//! insertion and the engine rejects the edge when it closes a loop.
//! [`find_all_cycles`] and [`has_cycles`] audit a stored graph; `verify`
//! runs the early-exit check first and only collects paths when it fails.
//!
//! All traversals are iterative with an explicit stack and a visited set, so
//! long dependency chains cannot overflow the call stack. There is no depth
//! cap; each node and edge is visited at most once (O(V+E)).

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::dependency::DependencyGraph;
use crate::model::ItemId;

// ---------------------------------------------------------------------------
// CyclePath
// ---------------------------------------------------------------------------

/// A loop in the dependency graph.
///
/// `path` starts at `edge_from`, follows required items, and ends at
/// `edge_from` again. Adding `A → B` on top of an existing `B → C → A` yields
/// `[A, B, C, A]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath {
    pub path: Vec<ItemId>,
    /// Dependent side of the edge that closes the loop.
    pub edge_from: ItemId,
    /// Required side of the edge that closes the loop.
    pub edge_to: ItemId,
}

impl fmt::Display for CyclePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.path.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join(" → "))
    }
}

// ---------------------------------------------------------------------------
// Detection on insert
// ---------------------------------------------------------------------------

/// Would adding `dependent → required` close a loop?
///
/// Searches the existing edges for a path `required → … → dependent`. A
/// self-edge is always a loop.
pub fn detect_cycle_on_add(
    graph: &DependencyGraph,
    dependent: ItemId,
    required: ItemId,
) -> Option<CyclePath> {
    if dependent == required {
        return Some(CyclePath {
            path: vec![dependent, dependent],
            edge_from: dependent,
            edge_to: required,
        });
    }

    let mut visited: HashSet<ItemId> = HashSet::from([required]);
    let mut came_from: HashMap<ItemId, ItemId> = HashMap::new();
    let mut stack = vec![required];

    while let Some(node) = stack.pop() {
        if node == dependent {
            let mut chain = vec![dependent];
            let mut cursor = dependent;
            while let Some(&prev) = came_from.get(&cursor) {
                chain.push(prev);
                cursor = prev;
            }
            chain.reverse();

            let mut path = Vec::with_capacity(chain.len() + 1);
            path.push(dependent);
            path.extend(chain);
            return Some(CyclePath {
                path,
                edge_from: dependent,
                edge_to: required,
            });
        }

        for next in graph.required_ids(node) {
            if visited.insert(next) {
                came_from.insert(next, node);
                stack.push(next);
            }
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Whole-graph audits
// ---------------------------------------------------------------------------

/// Every loop reachable by a colored DFS over the whole graph.
///
/// Each returned path corresponds to one back edge, so a single strongly
/// connected component may be reported more than once.
pub fn find_all_cycles(graph: &DependencyGraph) -> Vec<CyclePath> {
    walk(graph, false)
}

/// Returns `true` at the first loop found.
pub fn has_cycles(graph: &DependencyGraph) -> bool {
    !walk(graph, true).is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the DFS stack.
    Gray,
    /// Fully explored.
    Black,
}

struct Frame {
    node: ItemId,
    next: Vec<ItemId>,
    cursor: usize,
}

impl Frame {
    fn new(graph: &DependencyGraph, node: ItemId) -> Self {
        Self {
            node,
            next: graph.required_ids(node).collect(),
            cursor: 0,
        }
    }
}

fn walk(graph: &DependencyGraph, stop_at_first: bool) -> Vec<CyclePath> {
    let mut color: HashMap<ItemId, Color> = HashMap::new();
    let mut found = Vec::new();

    for start in graph.all_item_ids() {
        if color.contains_key(&start) {
            continue;
        }
        color.insert(start, Color::Gray);
        let mut stack = vec![Frame::new(graph, start)];

        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            let next = frame.next.get(frame.cursor).copied();
            frame.cursor += 1;

            let Some(child) = next else {
                color.insert(node, Color::Black);
                stack.pop();
                continue;
            };

            match color.get(&child) {
                None => {
                    color.insert(child, Color::Gray);
                    stack.push(Frame::new(graph, child));
                }
                Some(Color::Gray) => {
                    if let Some(pos) = stack.iter().position(|f| f.node == child) {
                        let mut path: Vec<ItemId> = stack[pos..].iter().map(|f| f.node).collect();
                        path.push(child);
                        found.push(CyclePath {
                            path,
                            edge_from: node,
                            edge_to: child,
                        });
                        if stop_at_first {
                            return found;
                        }
                    }
                }
                Some(Color::Black) => {}
            }
        }
    }

    found
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
