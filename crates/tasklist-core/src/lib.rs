//! tasklist-core: task consistency and scheduling engine.
//!
//! Lists hold items, items nest into parent/child trees, and items in any
//! list may depend on one another. The engine keeps three things true:
//!
//! - a parent's status always follows the aggregate status of its children
//!   ([`propagate`]),
//! - the dependency graph never contains a loop ([`graph::cycles`]),
//! - the scheduler never proposes a blocked item ([`schedule`]).
//!
//! All mutations go through [`engine::Engine`], which runs each compound
//! operation as one atomic unit of work on a [`store::Store`].
//!
//! # Conventions
//!
//! - **Errors**: [`error::EngineError`] for engine operations, `anyhow` inside
//!   storage adapters.
//! - **Logging**: `tracing` macros; subscribers are installed by binaries.

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod model;
pub mod progress;
pub mod propagate;
pub mod schedule;
pub mod status;
pub mod store;

pub use engine::{DeleteSummary, Engine};
pub use error::{EngineError, ErrorCode};
