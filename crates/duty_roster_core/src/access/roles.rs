//! Position-derived roles and duty exemptions.
//!
//! # Invariants
//! - A member's role is derived only from `position` through the configured
//!   position table; there is no separate role field.
//! - Assigners are exempt from duties of the type they assign.

use crate::config::RosterConfig;
use crate::model::duty::DutyType;
use crate::model::member::{Member, Residency};

/// Why a member does not owe duties of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExemptionReason {
    /// Holds a position exempt from every duty type.
    Position,
    /// Lives off campus.
    OffCampus,
    /// Explicit exemption record covering the type.
    Explicit,
    /// Assigns duties of this type.
    Assigner,
}

/// Duty type the member may assign, if any.
pub fn derive_role(config: &RosterConfig, member: &Member) -> Option<DutyType> {
    member
        .position
        .as_deref()
        .and_then(|position| config.assigner_kind(position))
}

/// Returns whether the member holds any assigner position.
pub fn is_assigner(config: &RosterConfig, member: &Member) -> bool {
    derive_role(config, member).is_some()
}

/// Returns the first rule exempting `member` from `kind`, if any.
pub fn exemption_reason(
    config: &RosterConfig,
    member: &Member,
    kind: DutyType,
) -> Option<ExemptionReason> {
    if member
        .position
        .as_deref()
        .is_some_and(|position| config.is_exempt_position(position))
    {
        return Some(ExemptionReason::Position);
    }
    if member.residency == Residency::OffCampus {
        return Some(ExemptionReason::OffCampus);
    }
    if member
        .exemption
        .as_ref()
        .is_some_and(|exemption| exemption.covers(kind))
    {
        return Some(ExemptionReason::Explicit);
    }
    if derive_role(config, member) == Some(kind) {
        return Some(ExemptionReason::Assigner);
    }
    None
}

pub fn is_exempt(config: &RosterConfig, member: &Member, kind: DutyType) -> bool {
    exemption_reason(config, member, kind).is_some()
}
