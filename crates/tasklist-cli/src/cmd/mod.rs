pub mod dep;
pub mod init;
pub mod item;
pub mod list;
pub mod next;
pub mod progress;
pub mod status;
pub mod verify;

use anyhow::{Context as _, Result};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use tasklist_core::Engine;
use tasklist_core::config::{DB_ENV_VAR, load_config, resolve_db_path};
use tasklist_core::store::SqliteStore;

/// Open the engine for `project_root`, honoring `--db`, `TASKLIST_DB` and
/// the `[storage]` config section in that order.
pub fn open_engine(db: Option<&Path>, project_root: &Path) -> Result<Engine<SqliteStore>> {
    let config = load_config(project_root)?;
    let env_value = std::env::var(DB_ENV_VAR).ok();
    let path = resolve_db_path(db, env_value.as_deref(), &config, project_root);
    let timeout = Duration::from_millis(config.storage.busy_timeout_ms);

    let store = SqliteStore::open(&path, timeout)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "opened tasklist database");
    Ok(Engine::with_config(store, config))
}

/// An item addressed across lists as `LIST/ITEM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub list: String,
    pub key: String,
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.list, self.key)
    }
}

/// Split a `list/item` reference on the first slash.
pub fn parse_item_ref(value: &str) -> Result<ItemRef, String> {
    match value.split_once('/') {
        Some((list, key)) if !list.is_empty() && !key.is_empty() => Ok(ItemRef {
            list: list.to_string(),
            key: key.to_string(),
        }),
        _ => Err(format!("expected LIST/ITEM, got '{value}'")),
    }
}
