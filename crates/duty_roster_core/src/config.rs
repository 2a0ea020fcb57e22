//! Chapter configuration.
//!
//! # Responsibility
//! - Hold the sign-in domain, the position tables and SMS formatting
//!   settings that the gate, roster and notification modules read.
//! - Load overrides from a JSON file; every field has a default.
//!
//! # Invariants
//! - A loaded config has passed `RosterConfig::validate()`.

use crate::model::duty::DutyType;
use log::info;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_EMAIL_DOMAIN: &str = "cornell.edu";
pub const DEFAULT_SMS_COUNTRY_CODE: &str = "+1";

/// Runtime configuration shared by gate, roster and notification code.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RosterConfig {
    /// Only emails under this domain may sign in.
    pub allowed_email_domain: String,
    /// Position title -> duty type that position assigns.
    pub assigner_positions: BTreeMap<String, DutyType>,
    /// Positions exempt from every duty type.
    pub exempt_positions: Vec<String>,
    /// Prefix added to stored phone digits before sending.
    pub sms_country_code: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            allowed_email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            assigner_positions: BTreeMap::from([
                ("Steward".to_string(), DutyType::Waiter),
                ("Cleaning Manager".to_string(), DutyType::Cleaning),
                ("Social Chair".to_string(), DutyType::Social),
            ]),
            exempt_positions: vec!["President".to_string()],
            sms_country_code: DEFAULT_SMS_COUNTRY_CODE.to_string(),
        }
    }
}

impl RosterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let domain = self.allowed_email_domain.trim();
        if domain.is_empty() || domain.contains('@') {
            return Err(ConfigError::Invalid(format!(
                "allowed_email_domain must be a bare domain, got `{}`",
                self.allowed_email_domain
            )));
        }

        if let Some(position) = self
            .assigner_positions
            .keys()
            .chain(self.exempt_positions.iter())
            .find(|position| position.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "position titles must not be blank, got `{position}`"
            )));
        }

        for (table, titles) in [
            (
                "assigner_positions",
                self.assigner_positions.keys().collect::<Vec<_>>(),
            ),
            ("exempt_positions", self.exempt_positions.iter().collect()),
        ] {
            let mut seen = BTreeMap::new();
            for title in titles {
                if let Some(previous) = seen.insert(normalize_title(title), title) {
                    return Err(ConfigError::Invalid(format!(
                        "{table} lists `{previous}` and `{title}`, which name the same position"
                    )));
                }
            }
        }

        let mut assigned = BTreeMap::new();
        for (position, kind) in &self.assigner_positions {
            if let Some(previous) = assigned.insert(*kind, position) {
                return Err(ConfigError::Invalid(format!(
                    "positions `{previous}` and `{position}` both assign {kind} duties"
                )));
            }
        }

        let code = self.sms_country_code.as_str();
        let digits = code.strip_prefix('+').unwrap_or("");
        if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(ConfigError::Invalid(format!(
                "sms_country_code must look like `+1`, got `{code}`"
            )));
        }

        Ok(())
    }

    /// Duty type assigned by `position`, if it is an assigner position.
    ///
    /// Titles compare case-insensitively after trimming.
    pub fn assigner_kind(&self, position: &str) -> Option<DutyType> {
        let position = normalize_title(position);
        self.assigner_positions
            .iter()
            .find(|(title, _)| normalize_title(title) == position)
            .map(|(_, kind)| *kind)
    }

    pub fn is_exempt_position(&self, position: &str) -> bool {
        let position = normalize_title(position);
        self.exempt_positions
            .iter()
            .any(|title| normalize_title(title) == position)
    }
}

/// Position titles compare trimmed and ASCII-lowercased.
fn normalize_title(title: &str) -> String {
    title.trim().to_ascii_lowercase()
}

/// Reads and validates a JSON config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<RosterConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: RosterConfig = serde_json::from_str(&raw).map_err(ConfigError::Parse)?;
    config.validate()?;

    info!(
        "event=config_load module=config status=ok path={} assigner_positions={} exempt_positions={}",
        path.display(),
        config.assigner_positions.len(),
        config.exempt_positions.len()
    );
    Ok(config)
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
