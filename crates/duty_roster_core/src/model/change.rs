//! Ledger change records.
//!
//! # Responsibility
//! - Describe what a committed duty write did, so callers can refresh
//!   views and the notification trigger can message affected members.
//! - Compute the assignee diff used by duty updates.
//!
//! # Invariants
//! - `AssignmentDiff` partitions `old ∪ new` into removed/added/retained.
//! - A `DutyChange` is only produced after its transaction committed.

use crate::model::duty::{Duty, DutyId, DutyType};
use std::collections::BTreeSet;

/// Assignee set difference between two versions of a duty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignmentDiff {
    /// In old, not in new. Lose their credit and back-reference.
    pub removed: Vec<String>,
    /// In new, not in old. Gain the default credit and a back-reference.
    pub added: Vec<String>,
    /// In both. Credit and checked state are left alone.
    pub retained: Vec<String>,
}

impl AssignmentDiff {
    /// Diffs two assignee lists, keeping each list's order.
    pub fn between(old: &[String], new: &[String]) -> Self {
        let old_set: BTreeSet<&str> = old.iter().map(String::as_str).collect();
        let new_set: BTreeSet<&str> = new.iter().map(String::as_str).collect();

        Self {
            removed: old
                .iter()
                .filter(|netid| !new_set.contains(netid.as_str()))
                .cloned()
                .collect(),
            added: new
                .iter()
                .filter(|netid| !old_set.contains(netid.as_str()))
                .cloned()
                .collect(),
            retained: new
                .iter()
                .filter(|netid| old_set.contains(netid.as_str()))
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// A committed duty write.
#[derive(Debug, Clone, PartialEq)]
pub enum DutyChange {
    Created(Duty),
    Updated {
        before: Duty,
        after: Duty,
        diff: AssignmentDiff,
    },
    Deleted(Duty),
}

impl DutyChange {
    pub fn duty_id(&self) -> &DutyId {
        match self {
            Self::Created(duty) | Self::Deleted(duty) => &duty.id,
            Self::Updated { after, .. } => &after.id,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Created(_) => "duty_created",
            Self::Updated { .. } => "duty_updated",
            Self::Deleted(_) => "duty_deleted",
        }
    }
}

/// Result of correcting one member's credit on one duty.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditAdjustment {
    pub duty_id: DutyId,
    pub kind: DutyType,
    pub netid: String,
    pub old_value: f64,
    pub new_value: f64,
}

impl CreditAdjustment {
    /// Signed amount applied to the member's aggregate.
    pub fn delta(&self) -> f64 {
        self.new_value - self.old_value
    }
}

/// A candidate who already holds a duty of the same type on the same day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentConflict {
    pub netid: String,
    pub duty_id: DutyId,
    pub duty_name: String,
    pub kind: DutyType,
    pub day: String,
}
