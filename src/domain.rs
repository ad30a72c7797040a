use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

fn experiment_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^E-[A-Z]{4}-\d+$").unwrap())
}

fn platform_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^A-[A-Z]{4}-\d+$").unwrap())
}

/// Experiment accession, e.g. `E-MEXP-297`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperimentAccession(String);

impl ExperimentAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The four-letter pipe code, e.g. `MEXP`.
    pub fn pipeline(&self) -> &str {
        &self.0[2..6]
    }
}

impl fmt::Display for ExperimentAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExperimentAccession {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !experiment_pattern().is_match(&normalized) {
            return Err(IngestError::InvalidExperimentAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Platform (array design) accession, e.g. `A-AFFY-6`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformAccession(String);

impl PlatformAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn pipeline(&self) -> &str {
        &self.0[2..6]
    }
}

impl fmt::Display for PlatformAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlatformAccession {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !platform_pattern().is_match(&normalized) {
            return Err(IngestError::InvalidPlatformAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Strips any colon-delimited namespace qualifier, keeping the text after the
/// last `:`. Identifiers in the flat files arrive both bare (`AFFX-101`) and
/// qualified (`ebi.ac.uk:Reporter:AFFX-101`).
pub fn strip_qualifier(value: &str) -> &str {
    match value.rfind(':') {
        Some(idx) => &value[idx + 1..],
        None => value,
    }
}
