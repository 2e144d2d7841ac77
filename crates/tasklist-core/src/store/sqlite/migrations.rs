//! Versioned schema for the tasklist database.
//!
//! The database is the system of record for lists, items and dependency
//! edges, so there is nothing to rebuild it from: migrations only add, and a
//! database stamped by a newer binary is refused instead of being touched.
//!
//! The version lives in `PRAGMA user_version` and is mirrored in
//! `store_meta.schema_version` for tools that only read tables.

use anyhow::{Result, bail};
use rusqlite::{Connection, types::Type};

use super::schema;

/// Newest schema this binary can read and write.
pub const LATEST_SCHEMA_VERSION: u32 = 1;

/// `(version, DDL)` in ascending order.
const STEPS: &[(u32, &str)] = &[(1, schema::MIGRATION_V1_SQL)];

/// Schema version stamped on the open database; 0 for a fresh file.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read or is negative.
pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Bring the database up to [`LATEST_SCHEMA_VERSION`] and return it.
///
/// Every step commits in its own transaction together with its version
/// stamp, so an interrupted upgrade resumes at the failed step.
///
/// # Errors
///
/// Returns an error if the database is newer than this binary or a step
/// fails.
pub fn migrate(conn: &mut Connection) -> Result<u32> {
    let mut version = schema_version(conn)?;
    if version > LATEST_SCHEMA_VERSION {
        bail!(
            "database schema v{version} is newer than supported v{LATEST_SCHEMA_VERSION}; upgrade tl"
        );
    }

    let pending: Vec<(u32, &str)> = STEPS
        .iter()
        .copied()
        .filter(|(step, _)| *step > version)
        .collect();
    for (step, sql) in pending {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(step))?;
        tx.execute(
            "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(step)],
        )?;
        tx.commit()?;
        tracing::info!(from = version, to = step, "migrated tasklist schema");
        version = step;
    }

    Ok(version)
}
