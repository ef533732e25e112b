use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Family of remote provider a series comes from. Stored as `series.source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceName {
    Economic,
    Equity,
    StatisticalAgency,
}

impl SourceName {
    pub const ALL: [Self; 3] = [Self::Economic, Self::Equity, Self::StatisticalAgency];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Economic => "economic",
            Self::Equity => "equity",
            Self::StatisticalAgency => "statistical-agency",
        }
    }

    /// Canonical form of a natural key for this source.
    ///
    /// Economic keys are uppercased, statistical-agency vectors lowercased,
    /// equity keys go through [`crate::Ticker`].
    pub fn normalize_key(self, key: &str) -> Result<String, ValidationError> {
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySeriesKey);
        }
        if let Some(ch) = trimmed
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-')))
        {
            return Err(ValidationError::SeriesKeyInvalidChar {
                value: trimmed.to_owned(),
                ch,
            });
        }

        Ok(match self {
            Self::Economic => trimmed.to_ascii_uppercase(),
            Self::StatisticalAgency => trimmed.to_ascii_lowercase(),
            Self::Equity => crate::Ticker::parse(trimmed)?.into(),
        })
    }
}

impl Display for SourceName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceName {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "economic" | "fred" => Ok(Self::Economic),
            "equity" | "yahoo" => Ok(Self::Equity),
            "statistical-agency" | "statcan" => Ok(Self::StatisticalAgency),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}
