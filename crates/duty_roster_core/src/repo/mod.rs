//! Repository layer over the roster database.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for members and duties.
//! - Own every multi-row ledger write and run it in one transaction.
//!
//! # Invariants
//! - Repository writes validate model invariants before any SQL mutation.
//! - Credit totals move only by compensating increments inside the same
//!   transaction that changes the duty.
//! - Repository APIs return semantic errors (`DutyNotFound`,
//!   `MemberNotFound`) in addition to DB transport errors.

use crate::db::DbError;
use crate::model::duty::{DutyId, DutyType, DutyValidationError};
use crate::model::member::MemberValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod duty_repo;
pub mod member_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for roster persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    DutyValidation(DutyValidationError),
    MemberValidation(MemberValidationError),
    DutyNotFound(DutyId),
    MemberNotFound(String),
    NotAssigned { duty_id: DutyId, netid: String },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DutyValidation(err) => write!(f, "{err}"),
            Self::MemberValidation(err) => write!(f, "{err}"),
            Self::DutyNotFound(id) => write!(f, "duty not found: {id}"),
            Self::MemberNotFound(netid) => write!(f, "member not found: {netid}"),
            Self::NotAssigned { duty_id, netid } => {
                write!(f, "member {netid} is not assigned to duty {duty_id}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted roster data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::DutyValidation(err) => Some(err),
            Self::MemberValidation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::from(value))
    }
}

impl From<DutyValidationError> for RepoError {
    fn from(value: DutyValidationError) -> Self {
        Self::DutyValidation(value)
    }
}

impl From<MemberValidationError> for RepoError {
    fn from(value: MemberValidationError) -> Self {
        Self::MemberValidation(value)
    }
}

fn parse_duty_type(value: &str, column: &str) -> RepoResult<DutyType> {
    DutyType::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid duty type `{value}` in {column}")))
}

fn parse_duty_id(value: &str, column: &str) -> RepoResult<DutyId> {
    DutyId::parse(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid duty id `{value}` in {column}")))
}

fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
