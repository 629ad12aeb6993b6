use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Upstream providers the dashboard talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Marketstack,
    Alphavantage,
    Openai,
}

impl ProviderId {
    pub const ALL: [Self; 3] = [Self::Marketstack, Self::Alphavantage, Self::Openai];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Marketstack => "marketstack",
            Self::Alphavantage => "alphavantage",
            Self::Openai => "openai",
        }
    }

    /// Environment variables holding the provider key, primary name first.
    pub const fn api_key_vars(self) -> [&'static str; 2] {
        match self {
            Self::Marketstack => ["STOCKPULSE_MARKETSTACK_API_KEY", "MARKETSTACK_API_KEY"],
            Self::Alphavantage => ["STOCKPULSE_ALPHAVANTAGE_API_KEY", "ALPHAVANTAGE_API_KEY"],
            Self::Openai => ["STOCKPULSE_OPENAI_API_KEY", "OPENAI_API_KEY"],
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == normalized)
            .ok_or_else(|| format!("unknown provider '{normalized}'"))
    }
}
