//! Access gate for protected roster content.
//!
//! # Responsibility
//! - Map session state plus an access requirement to exactly one view
//!   variant: loading, sign-in prompt, forbidden or ready.
//!
//! # Invariants
//! - Protected content is produced only for `GateView::Ready`.
//! - Assigners hold blanket rights over per-member pages.

use crate::access::roles::{derive_role, is_assigner};
use crate::access::sign_in::Session;
use crate::config::RosterConfig;
use crate::model::duty::DutyType;
use crate::model::member::Member;
use std::fmt::{Display, Formatter};

/// Session lifecycle as seen by the gate.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    /// Identity provider or member lookup still in flight.
    Loading,
    Authenticated(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }
}

/// Constraints a page places on the signed-in member.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessRequirement {
    /// Member must assign exactly this duty type.
    pub assigner_for: Option<DutyType>,
    /// Member must be this netid, unless they are an assigner.
    pub netid: Option<String>,
    /// Member must assign some duty type.
    pub any_assigner: bool,
}

impl AccessRequirement {
    /// Any signed-in member.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn assigner(kind: DutyType) -> Self {
        Self {
            assigner_for: Some(kind),
            ..Self::default()
        }
    }

    pub fn any_assigner() -> Self {
        Self {
            any_assigner: true,
            ..Self::default()
        }
    }

    pub fn member(netid: impl Into<String>) -> Self {
        Self {
            netid: Some(netid.into()),
            ..Self::default()
        }
    }
}

/// Why access was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    NotAssigner,
    WrongAssigner {
        required: DutyType,
        actual: Option<DutyType>,
    },
    NotOwner {
        netid: String,
    },
}

impl Denial {
    pub fn user_message(&self) -> &'static str {
        "You do not have permission to view this page."
    }
}

impl Display for Denial {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAssigner => write!(f, "member holds no assigner position"),
            Self::WrongAssigner { required, actual } => match actual {
                Some(actual) => write!(f, "requires {required} assigner, member assigns {actual}"),
                None => write!(f, "requires {required} assigner, member assigns nothing"),
            },
            Self::NotOwner { netid } => write!(f, "page belongs to member {netid}"),
        }
    }
}

/// Prompt shown to signed-out visitors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInPrompt {
    /// Domain the sign-in flow is restricted to.
    pub domain: String,
}

/// Exactly one of the views a protected page can render.
#[derive(Debug, Clone, PartialEq)]
pub enum GateView<T> {
    Loading,
    Unauthenticated(SignInPrompt),
    Forbidden(Denial),
    Ready(T),
}

impl<T> GateView<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(content) => Some(content),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> GateView<U> {
        match self {
            Self::Loading => GateView::Loading,
            Self::Unauthenticated(prompt) => GateView::Unauthenticated(prompt),
            Self::Forbidden(denial) => GateView::Forbidden(denial),
            Self::Ready(content) => GateView::Ready(f(content)),
        }
    }
}

/// Checks one member against one requirement.
pub fn check_permission(
    config: &RosterConfig,
    member: &Member,
    requirement: &AccessRequirement,
) -> Result<(), Denial> {
    if requirement.any_assigner && !is_assigner(config, member) {
        return Err(Denial::NotAssigner);
    }

    if let Some(required) = requirement.assigner_for {
        let actual = derive_role(config, member);
        if actual != Some(required) {
            return Err(Denial::WrongAssigner { required, actual });
        }
    }

    if let Some(netid) = requirement.netid.as_deref() {
        if member.netid != netid && !is_assigner(config, member) {
            return Err(Denial::NotOwner {
                netid: netid.to_string(),
            });
        }
    }

    Ok(())
}

/// Resolves the view for a protected page.
///
/// `content` runs only when access is granted.
pub fn resolve_gate<T>(
    config: &RosterConfig,
    state: &SessionState,
    requirement: &AccessRequirement,
    content: impl FnOnce(&Session) -> T,
) -> GateView<T> {
    match state {
        SessionState::Loading => GateView::Loading,
        SessionState::Unauthenticated => GateView::Unauthenticated(SignInPrompt {
            domain: config.allowed_email_domain.clone(),
        }),
        SessionState::Authenticated(session) => {
            match check_permission(config, &session.member, requirement) {
                Ok(()) => GateView::Ready(content(session)),
                Err(denial) => GateView::Forbidden(denial),
            }
        }
    }
}
