//! Canonical SQLite schema for tasklist.
//!
//! - `lists` owns `items` (`ON DELETE CASCADE`)
//! - `items.parent_id` references another item; deleting a parent removes its
//!   subtree
//! - `item_dependencies` holds one directed edge per ordered item pair
//! - `store_meta` records the schema version alongside `PRAGMA user_version`

/// Migration v1: lists, items, dependency edges, and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS lists (
    list_id INTEGER PRIMARY KEY AUTOINCREMENT,
    list_key TEXT NOT NULL UNIQUE CHECK (length(trim(list_key)) > 0),
    title TEXT NOT NULL,
    list_type TEXT NOT NULL CHECK (list_type IN ('sequential', 'parallel', 'hierarchical', 'linked')),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS items (
    item_id INTEGER PRIMARY KEY AUTOINCREMENT,
    list_id INTEGER NOT NULL REFERENCES lists(list_id) ON DELETE CASCADE,
    item_key TEXT NOT NULL CHECK (length(trim(item_key)) > 0),
    content TEXT NOT NULL,
    position INTEGER NOT NULL CHECK (position >= 0),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'in_progress', 'completed', 'failed')),
    parent_id INTEGER REFERENCES items(item_id) ON DELETE CASCADE,
    completion_states TEXT NOT NULL DEFAULT '{}',
    started_at_us INTEGER,
    completed_at_us INTEGER,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    UNIQUE (list_id, item_key),
    CHECK (parent_id IS NULL OR parent_id <> item_id)
);

CREATE TABLE IF NOT EXISTS item_dependencies (
    dependent_item_id INTEGER NOT NULL REFERENCES items(item_id) ON DELETE CASCADE,
    required_item_id INTEGER NOT NULL REFERENCES items(item_id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN ('blocks', 'requires')),
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (dependent_item_id, required_item_id),
    CHECK (dependent_item_id <> required_item_id)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 0);

CREATE UNIQUE INDEX IF NOT EXISTS idx_items_sibling_position
    ON items(list_id, IFNULL(parent_id, 0), position);
CREATE INDEX IF NOT EXISTS idx_items_parent
    ON items(parent_id, position);
CREATE INDEX IF NOT EXISTS idx_dependencies_required
    ON item_dependencies(required_item_id);
";

/// Indexes every migrated database must carry.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_items_sibling_position",
    "idx_items_parent",
    "idx_dependencies_required",
];
