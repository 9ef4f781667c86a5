//! Embedded schema steps for the catalog relational store.
//!
//! Each step is a SQL script tagged with the `user_version` it produces.
//! Pending steps run inside one transaction, so a failed step leaves the
//! recorded version untouched.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;
use std::cmp::Ordering;

struct SchemaStep {
    version: u32,
    label: &'static str,
    script: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    label: "items",
    script: include_str!("0001_items.sql"),
}];

/// Schema version this binary brings a database up to.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.iter().map(|step| step.version).max().unwrap_or(0)
}

/// Brings the connection's schema up to [`latest_version`].
///
/// # Errors
/// `UnsupportedSchemaVersion` when the database was written by a newer binary.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = current_user_version(conn)?;
    let latest = latest_version();

    match from_version.cmp(&latest) {
        Ordering::Greater => {
            return Err(DbError::UnsupportedSchemaVersion {
                db_version: from_version,
                latest_supported: latest,
            })
        }
        Ordering::Equal => return Ok(()),
        Ordering::Less => {}
    }

    let tx = conn.transaction()?;
    for step in SCHEMA_STEPS.iter().filter(|step| step.version > from_version) {
        tx.execute_batch(step.script)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=db_migrate_step module=db version={} label={}",
            step.version, step.label
        );
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={from_version} to_version={latest}");
    Ok(())
}

/// Reads `PRAGMA user_version` from the connection.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?;
    Ok(version)
}
