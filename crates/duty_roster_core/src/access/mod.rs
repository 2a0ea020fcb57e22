//! Access control for roster views.
//!
//! # Responsibility
//! - Derive assigner roles and duty exemptions from member positions.
//! - Gate protected content on session state and access requirements.
//! - Restrict sign-in to one email domain with a matching member record.

pub mod gate;
pub mod roles;
pub mod sign_in;
