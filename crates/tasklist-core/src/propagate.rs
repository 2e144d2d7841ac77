//! Parent status propagation.
//!
//! A parent's status is derived from **all** its children, first match wins:
//!
//! 1. any child `failed` → `failed`
//! 2. all children `pending` → `pending`
//! 3. all children `completed` → `completed`
//! 4. otherwise → `in_progress`
//!
//! Recomputation walks up the ancestor chain with an explicit worklist and
//! stops at the root or at the first ancestor whose stored status already
//! matches (fixed point). Callers run it inside the transaction of the change
//! that triggered it.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::model::{Item, ItemId, ListId, Status};
use crate::status::transition_update;
use crate::store::Store;

/// One status rewrite performed by propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub item_id: ItemId,
    pub key: String,
    pub from: Status,
    pub to: Status,
}

/// Derive a parent status from its children. `None` when there are none.
pub fn aggregate_status(children: impl IntoIterator<Item = Status>) -> Option<Status> {
    let mut any = false;
    let mut all_pending = true;
    let mut all_completed = true;

    for status in children {
        any = true;
        match status {
            Status::Failed => return Some(Status::Failed),
            Status::Pending => all_completed = false,
            Status::Completed => all_pending = false,
            Status::InProgress => {
                all_pending = false;
                all_completed = false;
            }
        }
    }

    if !any {
        None
    } else if all_pending {
        Some(Status::Pending)
    } else if all_completed {
        Some(Status::Completed)
    } else {
        Some(Status::InProgress)
    }
}

/// Recompute the ancestors of `changed` after its status moved.
///
/// # Errors
///
/// Storage errors pass through. A missing ancestor, an ancestor in another
/// list, or a revisited ancestor is an [`EngineError::Consistency`].
pub fn propagate_from<S: Store + ?Sized>(
    store: &mut S,
    changed: &Item,
    now_us: i64,
) -> Result<Vec<StatusChange>> {
    let Some(parent_id) = changed.parent_id else {
        return Ok(Vec::new());
    };
    recompute_chain(store, changed.list_id, parent_id, Some(changed.id), now_us)
}

/// Recompute `start` from its children, then continue upwards.
///
/// Used after a deletion, where the changed item no longer exists.
///
/// # Errors
///
/// Same as [`propagate_from`].
pub fn recompute_from<S: Store + ?Sized>(
    store: &mut S,
    list_id: ListId,
    start: ItemId,
    now_us: i64,
) -> Result<Vec<StatusChange>> {
    recompute_chain(store, list_id, start, None, now_us)
}

fn recompute_chain<S: Store + ?Sized>(
    store: &mut S,
    list_id: ListId,
    start: ItemId,
    origin: Option<ItemId>,
    now_us: i64,
) -> Result<Vec<StatusChange>> {
    let mut changes = Vec::new();
    let mut visited: HashSet<ItemId> = origin.into_iter().collect();
    let mut worklist = vec![start];

    while let Some(id) = worklist.pop() {
        if !visited.insert(id) {
            return Err(EngineError::Consistency(format!(
                "ancestor {id} revisited while propagating in list {list_id}"
            )));
        }

        let ancestor = store.get_item_by_id(id)?.ok_or_else(|| {
            EngineError::Consistency(format!("ancestor {id} is missing from list {list_id}"))
        })?;
        if ancestor.list_id != list_id {
            return Err(EngineError::Consistency(format!(
                "ancestor '{}' belongs to list {} instead of {list_id}",
                ancestor.key, ancestor.list_id
            )));
        }

        let children = store.children_of(id)?;
        let Some(derived) = aggregate_status(children.iter().map(|child| child.status)) else {
            break;
        };
        if derived == ancestor.status {
            tracing::debug!(item = %ancestor.key, status = %derived, "propagation reached fixed point");
            break;
        }

        let update = transition_update(&ancestor, derived, now_us);
        store.update_item(id, &update)?;
        tracing::debug!(
            item = %ancestor.key,
            from = %ancestor.status,
            to = %derived,
            "propagated status to parent"
        );
        changes.push(StatusChange {
            item_id: id,
            key: ancestor.key.clone(),
            from: ancestor.status,
            to: derived,
        });

        if let Some(next) = ancestor.parent_id {
            worklist.push(next);
        }
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemUpdate, ListType, NewItem, NewList};
    use crate::store::MemoryStore;

    #[test]
    fn aggregation_rules_in_order() {
        use Status::{Completed, Failed, InProgress, Pending};
        assert_eq!(aggregate_status([]), None);
        assert_eq!(aggregate_status([Pending, Completed, Failed]), Some(Failed));
        assert_eq!(aggregate_status([Pending, Pending]), Some(Pending));
        assert_eq!(aggregate_status([Completed, Completed]), Some(Completed));
        assert_eq!(aggregate_status([Completed, Pending]), Some(InProgress));
        assert_eq!(aggregate_status([InProgress]), Some(InProgress));
    }

    fn chain(store: &mut MemoryStore) -> (Item, Item, Item) {
        let list = store
            .insert_list(&NewList {
                key: "l".into(),
                title: "L".into(),
                list_type: ListType::Hierarchical,
                created_at_us: 0,
            })
            .expect("list");
        let mut parent = None;
        let mut made = Vec::new();
        for key in ["root", "mid", "leaf"] {
            let item = store
                .insert_item(&NewItem {
                    list_id: list.id,
                    key: key.into(),
                    content: key.into(),
                    position: 1,
                    parent_id: parent,
                    created_at_us: 0,
                })
                .expect("item");
            parent = Some(item.id);
            made.push(item);
        }
        let leaf = made.pop().expect("leaf");
        let mid = made.pop().expect("mid");
        let root = made.pop().expect("root");
        (root, mid, leaf)
    }

    fn set(store: &mut MemoryStore, item: &Item, status: Status) -> Item {
        store
            .update_item(item.id, &transition_update(item, status, 1))
            .expect("update")
    }

    #[test]
    fn completion_climbs_to_root() {
        let mut store = MemoryStore::new();
        let (root, mid, leaf) = chain(&mut store);

        let leaf = set(&mut store, &leaf, Status::Completed);
        let changes = propagate_from(&mut store, &leaf, 2).expect("propagate");

        assert_eq!(
            changes.iter().map(|c| c.key.as_str()).collect::<Vec<_>>(),
            ["mid", "root"]
        );
        let root = store.get_item_by_id(root.id).expect("get").expect("root");
        assert_eq!(root.status, Status::Completed);
        assert_eq!(root.completed_at_us, Some(2));
        let mid = store.get_item_by_id(mid.id).expect("get").expect("mid");
        assert_eq!(mid.status, Status::Completed);

        let again = propagate_from(&mut store, &leaf, 3).expect("propagate");
        assert!(again.is_empty());
    }

    #[test]
    fn stops_at_fixed_point() {
        let mut store = MemoryStore::new();
        let (root, mid, leaf) = chain(&mut store);
        store
            .update_item(
                mid.id,
                &ItemUpdate {
                    status: Some(Status::InProgress),
                    ..ItemUpdate::touch(1)
                },
            )
            .expect("mid");

        let leaf = set(&mut store, &leaf, Status::InProgress);
        let changes = propagate_from(&mut store, &leaf, 2).expect("propagate");
        assert!(changes.is_empty());
        let root = store.get_item_by_id(root.id).expect("get").expect("root");
        assert_eq!(root.status, Status::Pending);
    }

    #[test]
    fn root_change_propagates_nothing() {
        let mut store = MemoryStore::new();
        let (root, _, _) = chain(&mut store);
        let root = set(&mut store, &root, Status::Failed);
        assert!(propagate_from(&mut store, &root, 2).expect("ok").is_empty());
    }
}
