//! Core domain logic for the chapter duty roster.
//! This crate is the single source of truth for credit and assignment
//! invariants.

pub mod access;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;

pub use access::gate::{
    check_permission, resolve_gate, AccessRequirement, Denial, GateView, SessionState,
    SignInPrompt,
};
pub use access::roles::{derive_role, is_assigner, is_exempt, ExemptionReason};
pub use access::sign_in::{sign_in, Session, SignInError};
pub use config::{load_config, ConfigError, RosterConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::change::{AssignmentConflict, AssignmentDiff, CreditAdjustment, DutyChange};
pub use model::cohort::{Cohort, CohortRoster};
pub use model::duty::{day_key, week_window, Duty, DutyDate, DutyId, DutyType};
pub use model::member::{Exemption, Member, MemberClass, Residency};
pub use notify::{DispatchReport, LogSmsSender, NotificationTrigger, SmsError, SmsSender};
pub use repo::duty_repo::{DutyRepository, SqliteDutyRepository};
pub use repo::member_repo::{MemberRepository, SqliteMemberRepository};
pub use repo::{RepoError, RepoResult};
pub use service::duty_service::{DutyRequest, DutyService, DutyServiceError};
pub use service::roster_service::{
    DaySchedule, MemberDuties, RosterError, RosterService, WeekSchedule,
};
pub use service::ErrorCategory;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
