//! Cohort (pledge class) display groups.

use crate::model::member::Member;
use serde::{Deserialize, Serialize};

/// Semester value matched by fall cohorts.
pub const FALL_SEMESTER: &str = "Fall";

/// One display group of members, matched by class name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    /// Class name matched against `Member::class.name`.
    pub class: String,
    /// Display order; lower comes first.
    pub index: i64,
    /// When set, only members who entered in the fall semester match.
    pub fall_class: bool,
}

impl Cohort {
    pub fn new(class: impl Into<String>, index: i64) -> Self {
        Self {
            class: class.into(),
            index,
            fall_class: false,
        }
    }

    pub fn display_name(&self) -> String {
        if self.fall_class {
            format!("Fall {}", self.class)
        } else {
            self.class.clone()
        }
    }
}

/// One cohort with its members, for roster views.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortRoster {
    pub cohort: Cohort,
    pub members: Vec<Member>,
}
