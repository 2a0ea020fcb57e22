//! Member domain model.
//!
//! # Responsibility
//! - Define the chapter member record, its credit totals and duty
//!   back-references.
//! - Validate identity fields before persistence.
//!
//! # Invariants
//! - `netid` is the stable primary key and never changes.
//! - `credits` always carries an entry for every `DutyType`.

use crate::model::duty::{DutyId, DutyType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

static NETID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+$").expect("valid netid regex"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{7,15}$").expect("valid phone regex"));

/// Academic class a member entered with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemberClass {
    /// Display class name, e.g. `Alpha Omega`.
    pub name: String,
    /// Entry semester, `Fall` or `Spring`.
    pub semester: String,
}

/// Where a member lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Residency {
    #[default]
    InHouse,
    OnCampus,
    OffCampus,
}

impl Residency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InHouse => "in_house",
            Self::OnCampus => "on_campus",
            Self::OffCampus => "off_campus",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_house" => Some(Self::InHouse),
            "on_campus" => Some(Self::OnCampus),
            "off_campus" => Some(Self::OffCampus),
            _ => None,
        }
    }
}

/// Explicit exemption from one or more duty types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exemption {
    pub reason: String,
    pub kinds: BTreeSet<DutyType>,
}

impl Exemption {
    pub fn new(reason: impl Into<String>, kinds: impl IntoIterator<Item = DutyType>) -> Self {
        Self {
            reason: reason.into(),
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn covers(&self, kind: DutyType) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Back-reference from a member to one duty it is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyRef {
    pub duty_id: DutyId,
    #[serde(rename = "type")]
    pub kind: DutyType,
    /// Day key of the referenced duty.
    pub day: String,
}

/// Chapter member record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub netid: String,
    pub name: String,
    pub email: String,
    /// Digits only; the country code is added when a message is sent.
    pub phone: String,
    pub class: MemberClass,
    pub residency: Residency,
    /// Leadership position title, if any.
    pub position: Option<String>,
    /// Accumulated credit per duty type.
    pub credits: BTreeMap<DutyType, f64>,
    /// Denormalized references to assigned duties.
    pub duties: Vec<DutyRef>,
    pub exemption: Option<Exemption>,
}

impl Member {
    /// Creates an in-house member with zero credits and no duties.
    pub fn new(netid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            netid: netid.into(),
            name: name.into(),
            email: String::new(),
            phone: String::new(),
            class: MemberClass::default(),
            residency: Residency::InHouse,
            position: None,
            credits: zero_credits(),
            duties: Vec::new(),
            exemption: None,
        }
    }

    /// First whitespace-separated token of the display name.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }

    pub fn credit_for(&self, kind: DutyType) -> f64 {
        self.credits.get(&kind).copied().unwrap_or(0.0)
    }

    /// Returns whether the member already holds a duty of `kind` on `day`.
    pub fn has_duty_on(&self, kind: DutyType, day: &str) -> bool {
        self.duties
            .iter()
            .any(|duty| duty.kind == kind && duty.day == day)
    }

    pub fn validate(&self) -> Result<(), MemberValidationError> {
        if self.netid.is_empty() {
            return Err(MemberValidationError::EmptyNetid);
        }
        if !NETID_RE.is_match(&self.netid) {
            return Err(MemberValidationError::InvalidNetid(self.netid.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(MemberValidationError::EmptyName);
        }
        if !self.phone.is_empty() && !PHONE_RE.is_match(&self.phone) {
            return Err(MemberValidationError::InvalidPhone(self.netid.clone()));
        }
        Ok(())
    }
}

/// Credit map with every duty type at zero.
pub fn zero_credits() -> BTreeMap<DutyType, f64> {
    DutyType::ALL.into_iter().map(|kind| (kind, 0.0)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberValidationError {
    EmptyNetid,
    InvalidNetid(String),
    EmptyName,
    InvalidPhone(String),
}

impl Display for MemberValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyNetid => write!(f, "member netid must not be empty"),
            Self::InvalidNetid(value) => {
                write!(f, "member netid must be lowercase alphanumeric: `{value}`")
            }
            Self::EmptyName => write!(f, "member name must not be empty"),
            // Phone digits stay out of messages; they end up in logs.
            Self::InvalidPhone(netid) => write!(f, "invalid phone number for member {netid}"),
        }
    }
}

impl Error for MemberValidationError {}
