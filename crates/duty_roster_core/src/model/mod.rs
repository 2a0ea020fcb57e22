//! Roster domain model.
//!
//! # Responsibility
//! - Define members, duties, cohorts and the ledger change records that
//!   flow between storage, services and the notification trigger.
//!
//! # Invariants
//! - A duty's `assigned`, `assigned_names` and `credits` share one key set.
//! - A member's credit total per duty type is the sum of its assignment
//!   credits for that type.

pub mod change;
pub mod cohort;
pub mod duty;
pub mod member;
