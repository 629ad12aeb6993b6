use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Lookback window for historical price series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoricalRange {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[default]
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "5y")]
    FiveYears,
}

impl HistoricalRange {
    pub const ALL: [Self; 6] = [
        Self::OneDay,
        Self::FiveDays,
        Self::OneMonth,
        Self::SixMonths,
        Self::OneYear,
        Self::FiveYears,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1m",
            Self::SixMonths => "6m",
            Self::OneYear => "1y",
            Self::FiveYears => "5y",
        }
    }

    /// Calendar days to look back from today. Short ranges reach past weekends.
    pub const fn lookback_days(self) -> u32 {
        match self {
            Self::OneDay => 4,
            Self::FiveDays => 8,
            Self::OneMonth => 31,
            Self::SixMonths => 183,
            Self::OneYear => 366,
            Self::FiveYears => 1_827,
        }
    }

    /// Maximum daily points requested from upstream.
    pub const fn point_limit(self) -> usize {
        match self {
            Self::OneDay => 2,
            Self::FiveDays => 5,
            Self::OneMonth => 23,
            Self::SixMonths => 130,
            Self::OneYear => 260,
            Self::FiveYears => 1_000,
        }
    }

    /// How long a fetched series stays valid in the response cache.
    pub const fn cache_ttl(self) -> Duration {
        match self {
            Self::OneDay | Self::FiveDays => Duration::from_secs(5 * 60),
            Self::OneMonth | Self::SixMonths => Duration::from_secs(60 * 60),
            Self::OneYear | Self::FiveYears => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Display for HistoricalRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoricalRange {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|range| range.as_str() == normalized)
            .ok_or(ValidationError::InvalidRange { value: normalized })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_range() {
        assert_eq!(
            HistoricalRange::from_str(" 5Y ").expect("must parse"),
            HistoricalRange::FiveYears
        );
        assert!(matches!(
            HistoricalRange::from_str("2w"),
            Err(ValidationError::InvalidRange { .. })
        ));
    }

    #[test]
    fn multi_year_ranges_cache_longer_than_intraday() {
        assert_eq!(
            HistoricalRange::FiveYears.cache_ttl(),
            Duration::from_secs(86_400)
        );
        assert_eq!(HistoricalRange::OneDay.cache_ttl(), Duration::from_secs(300));
    }
}
