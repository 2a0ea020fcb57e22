//! Roster read-side service.
//!
//! # Responsibility
//! - Build the assigner views: who is due, the 7-day schedule and the
//!   check-off list.
//! - Build the member views: cohort roster and a member's own duties.
//!
//! # Invariants
//! - Exempt members never appear in `members_due`; exemption is applied
//!   after the credit-ordered fetch so the order is preserved.
//! - A week schedule always has one entry per day, in calendar order.

use crate::access::roles::is_exempt;
use crate::config::RosterConfig;
use crate::model::cohort::CohortRoster;
use crate::model::duty::{week_window, Duty, DutyType};
use crate::model::member::Member;
use crate::repo::duty_repo::DutyRepository;
use crate::repo::member_repo::MemberRepository;
use crate::repo::RepoError;
use crate::service::ErrorCategory;
use chrono::NaiveDate;
use log::info;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Duties of one type on one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    /// Ordered by name.
    pub duties: Vec<Duty>,
}

/// Seven consecutive days of one duty type.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekSchedule {
    pub kind: DutyType,
    pub days: Vec<DaySchedule>,
}

impl WeekSchedule {
    pub fn duty_count(&self) -> usize {
        self.days.iter().map(|day| day.duties.len()).sum()
    }
}

/// One member with their duties grouped by type.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDuties {
    pub member: Member,
    /// Every duty type is present; lists are ordered by time.
    pub duties: BTreeMap<DutyType, Vec<Duty>>,
}

/// Read-only roster queries over members and duties.
pub struct RosterService<'a, M: MemberRepository, D: DutyRepository> {
    config: &'a RosterConfig,
    members: M,
    duties: D,
}

impl<'a, M: MemberRepository, D: DutyRepository> RosterService<'a, M, D> {
    pub fn new(config: &'a RosterConfig, members: M, duties: D) -> Self {
        Self {
            config,
            members,
            duties,
        }
    }

    /// Non-exempt members ordered by ascending `kind` credit, then name.
    pub fn members_due(&self, kind: DutyType) -> Result<Vec<Member>, RosterError> {
        let fetched = self.members.list_members_by_credits(kind)?;
        let fetched_count = fetched.len();
        let due: Vec<Member> = fetched
            .into_iter()
            .filter(|member| !is_exempt(self.config, member, kind))
            .collect();

        info!(
            "event=members_due module=service status=ok type={kind} fetched={fetched_count} due={}",
            due.len()
        );
        Ok(due)
    }

    /// Cohorts in display order, each with its members by name.
    pub fn members_by_cohort(&self) -> Result<Vec<CohortRoster>, RosterError> {
        self.members
            .list_cohorts()?
            .into_iter()
            .map(|cohort| -> Result<CohortRoster, RosterError> {
                let members = self.members.list_members_in_cohort(&cohort)?;
                Ok(CohortRoster { cohort, members })
            })
            .collect()
    }

    /// One member and every duty they hold, grouped by type.
    pub fn member_duties(&self, netid: &str) -> Result<MemberDuties, RosterError> {
        let member = self
            .members
            .get_member(netid)?
            .ok_or_else(|| RosterError::MemberNotFound(netid.to_string()))?;

        let mut duties = BTreeMap::new();
        for kind in DutyType::ALL {
            duties.insert(kind, self.duties.list_duties_for_member(netid, kind)?);
        }
        Ok(MemberDuties { member, duties })
    }

    /// Duties of `kind` for the seven days starting at `start`.
    pub fn week_schedule(
        &self,
        kind: DutyType,
        start: NaiveDate,
    ) -> Result<WeekSchedule, RosterError> {
        let window = week_window(start);
        let per_day = self.duties.list_duties_by_days(kind, &window)?;
        if per_day.len() != window.len() {
            return Err(RepoError::InvalidData(format!(
                "expected {} day lists, got {}",
                window.len(),
                per_day.len()
            ))
            .into());
        }

        let days = window
            .into_iter()
            .zip(per_day)
            .map(|(date, duties)| DaySchedule { date, duties })
            .collect();
        Ok(WeekSchedule { kind, days })
    }

    /// Duties of `kind` for the check-off page, by time.
    pub fn duties_to_check(
        &self,
        kind: DutyType,
        only_unchecked: bool,
    ) -> Result<Vec<Duty>, RosterError> {
        Ok(self.duties.list_duties_by_type(kind, only_unchecked)?)
    }
}

/// Roster query failures.
#[derive(Debug)]
pub enum RosterError {
    MemberNotFound(String),
    Repo(RepoError),
}

impl RosterError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MemberNotFound(_) => ErrorCategory::NotFound,
            Self::Repo(RepoError::MemberNotFound(_) | RepoError::DutyNotFound(_)) => {
                ErrorCategory::NotFound
            }
            Self::Repo(_) => ErrorCategory::Backend,
        }
    }
}

impl Display for RosterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemberNotFound(netid) => write!(f, "member not found: {netid}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RosterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MemberNotFound(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for RosterError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}
