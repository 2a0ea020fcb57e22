//! Domain-restricted sign-in.
//!
//! # Responsibility
//! - Accept an email already verified by the identity provider and turn it
//!   into a roster session.
//!
//! # Invariants
//! - No `Session` exists for an email outside the configured domain.
//! - No `Session` exists without a matching member record.

use crate::access::gate::SessionState;
use crate::config::RosterConfig;
use crate::model::member::Member;
use crate::repo::member_repo::MemberRepository;
use crate::repo::RepoError;
use crate::service::ErrorCategory;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Authenticated roster session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub netid: String,
    pub email: String,
    /// Member record loaded at sign-in.
    pub member: Member,
}

impl Session {
    /// Ends the session.
    pub fn sign_out(self) -> SessionState {
        info!("event=sign_out module=access status=ok netid={}", self.netid);
        SessionState::Unauthenticated
    }
}

/// Sign-in failures. Every variant leaves the caller signed out.
#[derive(Debug)]
pub enum SignInError {
    /// Email is malformed or outside the allowed domain.
    DomainNotAllowed { domain: String },
    /// Email is valid but no member record matches its netid.
    UnknownMember(String),
    Backend(RepoError),
}

impl SignInError {
    /// Message shown to the person signing in.
    pub fn user_message(&self) -> String {
        match self {
            Self::DomainNotAllowed { domain } => format!("Must login with {domain} email."),
            Self::UnknownMember(_) => "No member exists with the given email.".to_string(),
            Self::Backend(_) => "Error signing in. Try again later.".to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DomainNotAllowed { .. } => ErrorCategory::Validation,
            Self::UnknownMember(_) => ErrorCategory::NotFound,
            Self::Backend(_) => ErrorCategory::Backend,
        }
    }
}

impl Display for SignInError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DomainNotAllowed { domain } => {
                write!(f, "sign-in restricted to the {domain} domain")
            }
            Self::UnknownMember(netid) => write!(f, "no member record for netid {netid}"),
            Self::Backend(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SignInError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Splits an address with exactly one `@` and two non-empty parts.
fn email_parts(email: &str) -> Option<(&str, &str)> {
    let (local, domain) = email.trim().split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some((local, domain))
}

/// Lowercased local part of an email address.
pub fn netid_from_email(email: &str) -> Option<String> {
    email_parts(email).map(|(local, _)| local.to_ascii_lowercase())
}

/// Lowercased domain part of an email address.
pub fn email_domain(email: &str) -> Option<String> {
    email_parts(email).map(|(_, domain)| domain.to_ascii_lowercase())
}

/// Signs in the holder of `email`.
///
/// # Errors
/// - `DomainNotAllowed` when the email is malformed or outside the domain.
/// - `UnknownMember` when no member record matches the netid.
/// - `Backend` when the member lookup fails.
pub fn sign_in<M: MemberRepository>(
    config: &RosterConfig,
    members: &M,
    email: &str,
) -> Result<Session, SignInError> {
    let allowed = config.allowed_email_domain.trim().to_ascii_lowercase();
    let netid = match (netid_from_email(email), email_domain(email)) {
        (Some(netid), Some(domain)) if domain == allowed => netid,
        _ => {
            warn!("event=sign_in module=access status=rejected reason=domain");
            return Err(SignInError::DomainNotAllowed { domain: allowed });
        }
    };

    let member = match members.get_member(&netid) {
        Ok(Some(member)) => member,
        Ok(None) => {
            warn!("event=sign_in module=access status=rejected reason=unknown_member netid={netid}");
            return Err(SignInError::UnknownMember(netid));
        }
        Err(err) => {
            warn!("event=sign_in module=access status=error netid={netid} error={err}");
            return Err(SignInError::Backend(err));
        }
    };

    info!("event=sign_in module=access status=ok netid={netid}");
    Ok(Session {
        netid,
        email: email.trim().to_string(),
        member,
    })
}
