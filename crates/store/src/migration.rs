//! Versioned schema bootstrap
//!
//! Each step runs in its own transaction together with the ledger row that
//! records it, so a failed step leaves the database at the previous version.

use crate::error::{Error, Result};
use crate::schema::{SCHEMA_SQL, SCHEMA_VERSION, VERSION_TABLE_SQL};
use rusqlite::Connection;
use tracing::{debug, info, trace};

/// One schema version and the SQL that produces it from the previous one
struct Step {
    version: i32,
    sql: &'static str,
}

/// Ascending by version; the last entry is [`SCHEMA_VERSION`].
const STEPS: &[Step] = &[Step { version: 1, sql: SCHEMA_SQL }];

pub struct MigrationManager;

impl MigrationManager {
    /// Highest recorded schema version, 0 for a fresh database.
    ///
    /// Creates the empty version ledger if it is missing.
    pub fn current_version(conn: &Connection) -> Result<i32> {
        conn.execute_batch(VERSION_TABLE_SQL)
            .map_err(|e| Error::database(format!("Failed to create version ledger: {e}")))?;

        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
            .map_err(|e| Error::database(format!("Failed to read schema version: {e}")))
    }

    /// Bring the schema up to [`SCHEMA_VERSION`], returning the versions applied.
    ///
    /// A database written by a newer build is refused rather than touched.
    pub fn migrate(conn: &Connection) -> Result<Vec<i32>> {
        let from = Self::current_version(conn)?;
        if from > SCHEMA_VERSION {
            return Err(Error::database(format!(
                "Database schema version {from} is newer than supported version {SCHEMA_VERSION}"
            )));
        }

        let pending: Vec<&Step> = STEPS.iter().filter(|step| step.version > from).collect();
        if pending.is_empty() {
            trace!(version = from, "Schema up to date");
            return Ok(Vec::new());
        }

        info!("Upgrading schema from version {} to {}", from, SCHEMA_VERSION);
        let mut applied = Vec::with_capacity(pending.len());
        for step in pending {
            Self::apply(conn, step)?;
            applied.push(step.version);
        }
        Ok(applied)
    }

    fn apply(conn: &Connection, step: &Step) -> Result<()> {
        debug!(version = step.version, "Applying schema step");

        let version_err = |e: rusqlite::Error| Error::database(format!("Schema step {} failed: {e}", step.version));
        let tx = conn.unchecked_transaction().map_err(version_err)?;
        tx.execute_batch(step.sql).map_err(version_err)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [step.version])
            .map_err(version_err)?;
        tx.commit().map_err(version_err)
    }
}
