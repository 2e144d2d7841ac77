//! Domain types shared by every engine component.

pub mod item;

pub use item::{
    DependencyEdge, DependencyKind, Item, ItemId, ItemUpdate, ListId, ListType, NewItem, NewList,
    ParseEnumError, Status, TaskList,
};

/// Current wall-clock time in microseconds since the Unix epoch.
#[must_use]
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}
