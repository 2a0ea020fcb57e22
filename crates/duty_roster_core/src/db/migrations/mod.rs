//! Roster schema migrations.
//!
//! # Invariants
//! - Versions start at 1 and increase by exactly one per migration.
//! - Applied version is mirrored to `PRAGMA user_version`.
//! - All pending migrations apply in one transaction, and the result must
//!   pass `PRAGMA foreign_key_check` before it commits.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Ordered schema steps; index `i` holds version `i + 1`.
const SCHEMA_STEPS: [&str; 2] = [
    include_str!("0001_members.sql"),
    include_str!("0002_duties.sql"),
];

/// What one `apply_migrations` call changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
}

impl MigrationReport {
    pub fn applied(&self) -> std::ops::RangeInclusive<u32> {
        (self.from_version + 1)..=self.to_version
    }

    pub fn is_noop(&self) -> bool {
        self.from_version == self.to_version
    }
}

/// Schema version this binary writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.len() as u32
}

/// Schema version stored in the database header.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

/// Brings the schema up to `latest_version()`.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer build.
/// - `DanglingReferences` when migrated data breaks a foreign key.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<MigrationReport> {
    let from_version = schema_version(conn)?;
    let to_version = latest_version();
    if from_version > to_version {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: to_version,
        });
    }

    let report = MigrationReport {
        from_version,
        to_version,
    };
    if report.is_noop() {
        return Ok(report);
    }

    let tx = conn.transaction()?;
    for version in report.applied() {
        let sql = SCHEMA_STEPS[(version - 1) as usize];
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    check_foreign_keys(&tx)?;
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={from_version} to_version={to_version}");
    Ok(report)
}

fn check_foreign_keys(conn: &Connection) -> DbResult<()> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check;")?;
    let mut rows = stmt.query([])?;
    let mut per_table: BTreeMap<String, usize> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        *per_table.entry(row.get(0)?).or_default() += 1;
    }
    match per_table.into_iter().next() {
        Some((table, rows)) => Err(DbError::DanglingReferences { table, rows }),
        None => Ok(()),
    }
}
