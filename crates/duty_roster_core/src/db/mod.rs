//! SQLite storage for the duty roster.
//!
//! # Responsibility
//! - Open and configure the roster database.
//! - Apply schema migrations in deterministic order.
//! - Classify SQLite failures so the ledger can tell rejected input
//!   (constraint violations) from storage faults.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Members, duties and credit totals are never touched before migrations
//!   succeed.
//! - One SQLite transaction is the unit of atomicity for a ledger batch.

use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use migrations::{latest_version, schema_version, MigrationReport};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Storage failures for the roster database.
#[derive(Debug)]
pub enum DbError {
    /// Unique, check or foreign-key constraint rejected a write.
    Constraint(rusqlite::Error),
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// `PRAGMA foreign_key_check` found orphaned rows after migrating.
    DanglingReferences { table: String, rows: usize },
}

impl DbError {
    /// Returns whether the store refused the write because of its input.
    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint(_))
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constraint(err) => write!(f, "roster constraint violated: {err}"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "roster schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::DanglingReferences { table, rows } => {
                write!(f, "{rows} row(s) in `{table}` reference missing records")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Constraint(err) | Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::DanglingReferences { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => Self::Constraint(value),
            _ => Self::Sqlite(value),
        }
    }
}
