//! Duty domain model.
//!
//! # Responsibility
//! - Define duty types, identifiers, calendar dates and the duty record.
//! - Validate the assignment invariants before persistence.
//!
//! # Invariants
//! - `assigned`, `assigned_names` and `credits` have identical key sets.
//! - Every credit value is finite.
//! - `checked` only names assigned members.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Credit granted to a freshly assigned member.
pub const DEFAULT_ASSIGNMENT_CREDIT: f64 = 1.0;
/// Day key layout, e.g. `08-24-2022`.
pub const DAY_KEY_FORMAT: &str = "%m-%d-%Y";
/// Length of generated duty identifiers.
pub const DUTY_ID_LEN: usize = 20;
/// Number of days covered by one schedule window.
pub const WEEK_WINDOW_DAYS: usize = 7;

/// Fixed duty categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyType {
    /// Dining service shifts, assigned by the steward.
    Waiter,
    /// House cleaning, assigned by the cleaning manager.
    Cleaning,
    /// Social event staffing, assigned by the social chair.
    Social,
}

impl DutyType {
    pub const ALL: [DutyType; 3] = [DutyType::Waiter, DutyType::Cleaning, DutyType::Social];

    /// Stable string id used in storage and URLs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiter => "waiter",
            Self::Cleaning => "cleaning",
            Self::Social => "social",
        }
    }

    /// Parses a stable string id. Matching is exact.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiter" => Some(Self::Waiter),
            "cleaning" => Some(Self::Cleaning),
            "social" => Some(Self::Social),
            _ => None,
        }
    }
}

impl Display for DutyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generated duty identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DutyId(String);

impl DutyId {
    /// Generates a fresh 20-character alphanumeric identifier.
    pub fn generate() -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(DUTY_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Parses an externally supplied identifier.
    pub fn parse(value: &str) -> Result<Self, DutyValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(DutyValidationError::InvalidId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DutyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Calendar placement of a duty.
///
/// `time` is the chapter-local wall clock encoded as epoch milliseconds, so
/// `day` and `time` always describe the same calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyDate {
    /// `MM-dd-yyyy` key used for exact-day queries.
    pub day: String,
    /// Epoch milliseconds, used for ordering.
    pub time: i64,
}

impl DutyDate {
    pub fn from_local(at: NaiveDateTime) -> Self {
        Self {
            day: day_key(at.date()),
            time: at.and_utc().timestamp_millis(),
        }
    }

    /// Returns the wall-clock time this date was created from.
    pub fn local_time(&self) -> Option<NaiveDateTime> {
        DateTime::from_timestamp_millis(self.time).map(|at| at.naive_utc())
    }

    /// Parses the day key back into a calendar date.
    pub fn calendar_day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.day, DAY_KEY_FORMAT).ok()
    }
}

/// Formats a calendar date as a duty day key.
pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_KEY_FORMAT).to_string()
}

/// Returns the seven consecutive days starting at `start`.
pub fn week_window(start: NaiveDate) -> [NaiveDate; WEEK_WINDOW_DAYS] {
    std::array::from_fn(|offset| start + Duration::days(offset as i64))
}

/// Duty record with its denormalized assignment maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duty {
    pub id: DutyId,
    #[serde(rename = "type")]
    pub kind: DutyType,
    pub name: String,
    pub date: DutyDate,
    /// Assignee netids in assignment order.
    pub assigned: Vec<String>,
    /// netid -> display name at assignment time.
    pub assigned_names: BTreeMap<String, String>,
    /// netid -> credit granted for this assignment.
    pub credits: BTreeMap<String, f64>,
    /// Assignees whose credit was confirmed at check-off.
    pub checked: BTreeSet<String>,
}

impl Duty {
    /// Creates an unassigned duty with a generated id.
    pub fn new(kind: DutyType, name: impl Into<String>, date: DutyDate) -> Self {
        Self::with_id(DutyId::generate(), kind, name, date)
    }

    pub fn with_id(id: DutyId, kind: DutyType, name: impl Into<String>, date: DutyDate) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            date,
            assigned: Vec::new(),
            assigned_names: BTreeMap::new(),
            credits: BTreeMap::new(),
            checked: BTreeSet::new(),
        }
    }

    /// Adds one assignee with the given credit value.
    ///
    /// Re-assigning an existing netid only refreshes its name and credit.
    pub fn assign(&mut self, netid: impl Into<String>, name: impl Into<String>, credit: f64) {
        let netid = netid.into();
        if !self.assigned.contains(&netid) {
            self.assigned.push(netid.clone());
        }
        self.assigned_names.insert(netid.clone(), name.into());
        self.credits.insert(netid, credit);
    }

    /// Removes one assignee from every assignment map.
    pub fn unassign(&mut self, netid: &str) {
        self.assigned.retain(|current| current != netid);
        self.assigned_names.remove(netid);
        self.credits.remove(netid);
        self.checked.remove(netid);
    }

    pub fn is_assigned(&self, netid: &str) -> bool {
        self.credits.contains_key(netid)
    }

    pub fn credit_for(&self, netid: &str) -> Option<f64> {
        self.credits.get(netid).copied()
    }

    /// Returns whether every assignee has been checked off.
    pub fn is_fully_checked(&self) -> bool {
        self.assigned.iter().all(|netid| self.checked.contains(netid))
    }

    /// Validates name, assignment and credit invariants.
    pub fn validate(&self) -> Result<(), DutyValidationError> {
        if self.name.trim().is_empty() {
            return Err(DutyValidationError::EmptyName);
        }
        if self.assigned.is_empty() {
            return Err(DutyValidationError::NoAssignees);
        }

        let mut seen = BTreeSet::new();
        for netid in &self.assigned {
            if !seen.insert(netid.as_str()) {
                return Err(DutyValidationError::DuplicateAssignee(netid.clone()));
            }
        }

        let names: BTreeSet<&str> = self.assigned_names.keys().map(String::as_str).collect();
        let credits: BTreeSet<&str> = self.credits.keys().map(String::as_str).collect();
        if let Some(netid) = seen
            .symmetric_difference(&names)
            .chain(seen.symmetric_difference(&credits))
            .next()
        {
            return Err(DutyValidationError::MismatchedAssignment(netid.to_string()));
        }

        if let Some((netid, _)) = self.credits.iter().find(|(_, value)| !value.is_finite()) {
            return Err(DutyValidationError::NonFiniteCredit(netid.clone()));
        }

        if let Some(netid) = self.checked.iter().find(|netid| !seen.contains(netid.as_str())) {
            return Err(DutyValidationError::CheckedNotAssigned(netid.clone()));
        }

        Ok(())
    }
}

/// Duty invariant violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DutyValidationError {
    InvalidId(String),
    EmptyName,
    NoAssignees,
    DuplicateAssignee(String),
    MismatchedAssignment(String),
    NonFiniteCredit(String),
    CheckedNotAssigned(String),
}

impl Display for DutyValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(value) => write!(f, "invalid duty id: `{value}`"),
            Self::EmptyName => write!(f, "duty name must not be empty"),
            Self::NoAssignees => write!(f, "duty must have at least one assignee"),
            Self::DuplicateAssignee(netid) => write!(f, "member assigned twice: {netid}"),
            Self::MismatchedAssignment(netid) => {
                write!(f, "assignment maps disagree for member: {netid}")
            }
            Self::NonFiniteCredit(netid) => write!(f, "credit is not a finite number for: {netid}"),
            Self::CheckedNotAssigned(netid) => {
                write!(f, "checked member is not assigned: {netid}")
            }
        }
    }
}

impl Error for DutyValidationError {}
