//! Item status state machine.
//!
//! `pending → in_progress → {completed, failed}`; any state may be reopened
//! to `pending` or `in_progress`, and `completed → failed` is legal. The only
//! guarded transition is completing an item that still has unfinished
//! children.

use crate::error::{EngineError, Result};
use crate::model::{Item, ItemUpdate, Status};

/// Check whether `item` may move to `target`.
///
/// Completing an item with children requires every child to be `completed`,
/// unless `force` is set.
///
/// # Errors
///
/// Returns [`EngineError::IncompleteChildren`] when the precondition fails.
pub fn check_transition(item: &Item, children: &[&Item], target: Status, force: bool) -> Result<()> {
    if target != Status::Completed || force || children.is_empty() {
        return Ok(());
    }

    let incomplete = children
        .iter()
        .filter(|child| child.status != Status::Completed)
        .count();
    if incomplete == 0 {
        return Ok(());
    }

    Err(EngineError::IncompleteChildren {
        item: item.key.clone(),
        incomplete,
        total: children.len(),
    })
}

/// Build the store update that moves `item` to `target` at `now_us`.
///
/// Re-applying the current status only bumps `updated_at_us`.
#[must_use]
pub fn transition_update(item: &Item, target: Status, now_us: i64) -> ItemUpdate {
    let mut update = ItemUpdate {
        status: Some(target),
        ..ItemUpdate::touch(now_us)
    };
    if item.status == target {
        return update;
    }

    match target {
        Status::InProgress => {
            if item.started_at_us.is_none() {
                update.started_at_us = Some(Some(now_us));
            }
            update.completed_at_us = Some(None);
        }
        Status::Completed | Status::Failed => {
            update.completed_at_us = Some(Some(now_us));
        }
        Status::Pending => {
            update.completed_at_us = Some(None);
        }
    }
    update
}
