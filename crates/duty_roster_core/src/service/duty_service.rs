//! Duty ledger use-case service.
//!
//! # Responsibility
//! - Validate assigner input before it reaches the ledger.
//! - Expose create/update/delete/adjust as single committed batches and
//!   return the change record each one produced.
//!
//! # Invariants
//! - Rejected input never opens a write transaction.
//! - Conflict checks never block a write.

use crate::model::change::{AssignmentConflict, CreditAdjustment, DutyChange};
use crate::model::duty::{day_key, DutyDate, DutyId, DutyType, DutyValidationError};
use crate::repo::duty_repo::{DutyDraft, DutyEdit, DutyRepository};
use crate::repo::RepoError;
use crate::service::ErrorCategory;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Assigner input for creating or editing a duty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyRequest {
    pub name: String,
    /// Chapter-local date and time of the duty.
    pub at: NaiveDateTime,
    /// Assignee netids in display order.
    pub assignees: Vec<String>,
}

impl DutyRequest {
    pub fn new(
        name: impl Into<String>,
        at: NaiveDateTime,
        assignees: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            at,
            assignees: assignees.into_iter().map(Into::into).collect(),
        }
    }

    fn validated(&self) -> Result<(String, DutyDate, Vec<String>), DutyValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DutyValidationError::EmptyName);
        }

        let mut seen = BTreeSet::new();
        let mut assignees = Vec::with_capacity(self.assignees.len());
        for netid in &self.assignees {
            let netid = netid.trim();
            if netid.is_empty() {
                continue;
            }
            if !seen.insert(netid) {
                return Err(DutyValidationError::DuplicateAssignee(netid.to_string()));
            }
            assignees.push(netid.to_string());
        }
        if assignees.is_empty() {
            return Err(DutyValidationError::NoAssignees);
        }

        Ok((name.to_string(), DutyDate::from_local(self.at), assignees))
    }
}

/// Use-case service wrapper for duty ledger writes.
pub struct DutyService<R: DutyRepository> {
    repo: R,
}

impl<R: DutyRepository> DutyService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one duty of `kind` and credits each assignee.
    ///
    /// # Errors
    /// - `Validation` for an empty name, no assignees or a repeated netid.
    /// - `MemberNotFound` when an assignee has no member record.
    pub fn create_duty(
        &self,
        kind: DutyType,
        request: &DutyRequest,
    ) -> Result<DutyChange, DutyServiceError> {
        let (name, date, assignees) = request.validated()?;
        let duty = self.repo.create_duty(&DutyDraft {
            kind,
            name,
            date,
            assignees,
        })?;
        Ok(DutyChange::Created(duty))
    }

    /// Replaces name, date and assignees of one duty.
    ///
    /// Retained assignees keep their credit; removed ones lose theirs and
    /// added ones gain the default credit, all in one batch.
    pub fn update_duty(
        &self,
        id: &DutyId,
        request: &DutyRequest,
    ) -> Result<DutyChange, DutyServiceError> {
        let (name, date, assignees) = request.validated()?;
        Ok(self.repo.update_duty(
            id,
            &DutyEdit {
                name,
                date,
                assignees,
            },
        )?)
    }

    /// Deletes one duty and reverses every credit it granted.
    pub fn delete_duty(&self, id: &DutyId) -> Result<DutyChange, DutyServiceError> {
        Ok(DutyChange::Deleted(self.repo.delete_duty(id)?))
    }

    /// Sets one member's credit on one duty and marks it checked.
    pub fn adjust_credit(
        &self,
        id: &DutyId,
        netid: &str,
        value: f64,
    ) -> Result<CreditAdjustment, DutyServiceError> {
        if !value.is_finite() {
            return Err(DutyValidationError::NonFiniteCredit(netid.to_string()).into());
        }
        Ok(self.repo.adjust_credit(id, netid, value)?)
    }

    /// Candidates who already hold a `kind` duty on `date`.
    ///
    /// `editing` excludes the duty being edited from the check.
    pub fn assignment_conflicts(
        &self,
        kind: DutyType,
        date: NaiveDate,
        candidates: &[String],
        editing: Option<&DutyId>,
    ) -> Result<Vec<AssignmentConflict>, DutyServiceError> {
        Ok(self
            .repo
            .find_conflicts(kind, &day_key(date), candidates, editing)?)
    }
}

/// Duty service failures.
#[derive(Debug)]
pub enum DutyServiceError {
    Validation(DutyValidationError),
    DutyNotFound(DutyId),
    MemberNotFound(String),
    NotAssigned { duty_id: DutyId, netid: String },
    Repo(RepoError),
}

impl DutyServiceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Repo(RepoError::Db(err)) if err.is_constraint() => ErrorCategory::Validation,
            Self::DutyNotFound(_) | Self::MemberNotFound(_) | Self::NotAssigned { .. } => {
                ErrorCategory::NotFound
            }
            Self::Repo(_) => ErrorCategory::Backend,
        }
    }
}

impl Display for DutyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DutyNotFound(id) => write!(f, "duty not found: {id}"),
            Self::MemberNotFound(netid) => write!(f, "member not found: {netid}"),
            Self::NotAssigned { duty_id, netid } => {
                write!(f, "member {netid} is not assigned to duty {duty_id}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DutyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DutyValidationError> for DutyServiceError {
    fn from(value: DutyValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for DutyServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DutyValidation(err) => Self::Validation(err),
            RepoError::DutyNotFound(id) => Self::DutyNotFound(id),
            RepoError::MemberNotFound(netid) => Self::MemberNotFound(netid),
            RepoError::NotAssigned { duty_id, netid } => Self::NotAssigned { duty_id, netid },
            other => Self::Repo(other),
        }
    }
}
