//! Graph-level views over items.
//!
//! ## Submodules
//!
//! - [`hierarchy`]: parent/child containment within one list (arena + index)
//!   and reparent validation.
//! - [`dependency`]: directed dependency edges between items, possibly across
//!   lists, and the blocking queries built on them.
//! - [`cycles`]: cycle detection on edge insertion and whole-graph audits.

pub mod cycles;
pub mod dependency;
pub mod hierarchy;
