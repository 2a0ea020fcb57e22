//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into roster use cases.
//! - Classify every failure into one of three caller-facing categories.

use std::fmt::{Display, Formatter};

pub mod duty_service;
pub mod roster_service;

/// Caller-facing failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Input rejected before any write.
    Validation,
    /// Referenced duty or member does not exist.
    NotFound,
    /// Store or transport failure; the batch did not commit.
    Backend,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Backend => "backend",
        }
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
