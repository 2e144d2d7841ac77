//! Property tests for the engine invariants.
//!
//! Trees are generated as parent vectors: item `i` either is a root or hangs
//! under some earlier item, so every generated shape is a valid forest.

use proptest::prelude::*;
use tasklist_core::engine::Engine;
use tasklist_core::error::ErrorCode;
use tasklist_core::model::{DependencyKind, ListType, Status};
use tasklist_core::store::{MemoryStore, Store};

const LIST: &str = "P";

fn key(i: usize) -> String {
    format!("i{i}")
}

/// `parents[i]` is `Some(j)` with `j < i`, or `None` for a root.
fn arb_forest(max: usize) -> impl Strategy<Value = Vec<Option<usize>>> {
    (1..=max).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                if i == 0 {
                    Just(None).boxed()
                } else {
                    prop_oneof![Just(None), (0..i).prop_map(Some)].boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}

fn arb_status() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Pending),
        Just(Status::InProgress),
        Just(Status::Completed),
        Just(Status::Failed),
    ]
}

fn build(parents: &[Option<usize>]) -> Engine<MemoryStore> {
    let mut engine = Engine::new(MemoryStore::new());
    engine
        .create_list(LIST, "Property", ListType::Hierarchical)
        .expect("list");
    for (i, parent) in parents.iter().copied().enumerate() {
        let parent_key = parent.map(key);
        engine
            .add_item(LIST, &key(i), "generated", parent_key.as_deref())
            .expect("add item");
    }
    engine
}

fn leaves(parents: &[Option<usize>]) -> Vec<usize> {
    (0..parents.len())
        .filter(|&i| !parents.contains(&Some(i)))
        .collect()
}

fn ancestors(parents: &[Option<usize>], mut i: usize) -> Vec<usize> {
    let mut out = Vec::new();
    while let Some(parent) = parents[i] {
        out.push(parent);
        i = parent;
    }
    out
}

fn status_of(engine: &Engine<MemoryStore>, i: usize) -> Status {
    engine.item(LIST, &key(i)).expect("item").status
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn dependency_graph_stays_acyclic(
        pairs in prop::collection::vec((0usize..8, 0usize..8), 0..40)
    ) {
        let mut engine = build(&[None; 8]);
        for (dependent, required) in pairs {
            let before = engine.store().all_dependency_edges().expect("edges");
            let result = engine.add_dependency(
                LIST, &key(dependent), LIST, &key(required), DependencyKind::Requires,
            );
            match result {
                Ok(_) => {}
                Err(err) => {
                    prop_assert_eq!(err.code(), ErrorCode::CycleDetected);
                    let after = engine.store().all_dependency_edges().expect("edges");
                    prop_assert_eq!(before, after);
                }
            }
            prop_assert!(engine.verify().expect("verify").is_empty());
        }
    }

    #[test]
    fn completing_every_leaf_completes_every_ancestor(
        (parents, order) in arb_forest(12).prop_flat_map(|parents| {
            let order = leaves(&parents);
            (Just(parents), Just(order).prop_shuffle())
        }),
    ) {
        let mut engine = build(&parents);
        for leaf in order {
            engine
                .update_status(LIST, &key(leaf), Status::Completed, false)
                .expect("complete leaf");
        }
        for i in 0..parents.len() {
            prop_assert_eq!(status_of(&engine, i), Status::Completed, "item {}", i);
        }
    }

    #[test]
    fn failed_leaf_fails_every_ancestor(
        parents in arb_forest(12),
        statuses in prop::collection::vec(arb_status(), 12),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut engine = build(&parents);
        let leaf_ids = leaves(&parents);
        for &leaf in &leaf_ids {
            engine
                .update_status(LIST, &key(leaf), statuses[leaf], false)
                .expect("set leaf status");
        }

        let failed = leaf_ids[pick.index(leaf_ids.len())];
        engine
            .update_status(LIST, &key(failed), Status::Failed, false)
            .expect("fail leaf");
        for ancestor in ancestors(&parents, failed) {
            prop_assert_eq!(status_of(&engine, ancestor), Status::Failed, "item {}", ancestor);
        }
    }

    #[test]
    fn propagation_is_idempotent(
        parents in arb_forest(12),
        statuses in prop::collection::vec(arb_status(), 12),
    ) {
        let mut engine = build(&parents);
        for leaf in leaves(&parents) {
            engine
                .update_status(LIST, &key(leaf), statuses[leaf], false)
                .expect("set leaf status");
        }

        let before = engine.items(LIST).expect("items");
        for i in 0..parents.len() {
            let changes = engine.propagate(LIST, &key(i)).expect("propagate");
            prop_assert!(changes.is_empty(), "item {} changed {:?}", i, changes);
        }
        prop_assert_eq!(before, engine.items(LIST).expect("items"));
    }

    #[test]
    fn scheduler_never_returns_blocked_items(
        parents in arb_forest(10),
        statuses in prop::collection::vec(arb_status(), 10),
        pairs in prop::collection::vec((0usize..10, 0usize..10), 0..20),
    ) {
        let mut engine = build(&parents);
        let n = parents.len();
        for leaf in leaves(&parents) {
            engine
                .update_status(LIST, &key(leaf), statuses[leaf], false)
                .expect("set leaf status");
        }
        for (dependent, required) in pairs {
            if dependent < n && required < n {
                // Rejected loops are fine; the graph stays acyclic either way.
                let _ = engine.add_dependency(
                    LIST, &key(dependent), LIST, &key(required), DependencyKind::Blocks,
                );
            }
        }

        if let Some(next) = engine.schedule_next(LIST).expect("schedule") {
            prop_assert!(!engine.is_blocked(LIST, &next.key).expect("is_blocked"));
            prop_assert_eq!(next.status, Status::Pending);
        }
        for candidate in engine.candidates(LIST).expect("candidates") {
            prop_assert!(!engine.is_blocked(LIST, &candidate.item.key).expect("is_blocked"));
        }
    }
}
