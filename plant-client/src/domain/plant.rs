use std::{fmt, str::FromStr};

/// One power plant as stored in the `plants` table.
///
/// `facility_id` is the EIA ORIS facility code and acts as the natural key:
/// there is at most one stored row per facility.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PlantRecord {
    pub facility_id: i64,
    pub name: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub annual_net_generation: f64,
}

/// Aggregate generation over a (possibly state-filtered) set of plants.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GenerationTotals {
    pub total: f64,
    pub count: u64,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("state code must be exactly two letters, got '{0}'")]
pub struct InvalidStateCode(pub String);

/// Two-letter uppercase US state abbreviation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct StateCode(String);

impl StateCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, state: &str) -> bool {
        self.0 == state
    }
}

impl FromStr for StateCode {
    type Err = InvalidStateCode;

    /// Accepts either case and surrounding whitespace; stores uppercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(InvalidStateCode(s.to_string()))
        }
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
