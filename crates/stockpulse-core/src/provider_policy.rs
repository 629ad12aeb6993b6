use std::time::Duration;

use crate::ProviderId;

/// Per-provider request budget and transport limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub request_timeout: Duration,
}

impl ProviderPolicy {
    pub fn marketstack_default() -> Self {
        Self {
            provider_id: ProviderId::Marketstack,
            quota_window: Duration::from_secs(60),
            quota_limit: 60,
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Alpha Vantage free tier: five calls per minute.
    pub fn alphavantage_default() -> Self {
        Self {
            provider_id: ProviderId::Alphavantage,
            quota_window: Duration::from_secs(60),
            quota_limit: 5,
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Completions are slow; the timeout is sized for a full analysis.
    pub fn openai_default() -> Self {
        Self {
            provider_id: ProviderId::Openai,
            quota_window: Duration::from_secs(60),
            quota_limit: 20,
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn default_for(provider_id: ProviderId) -> Self {
        match provider_id {
            ProviderId::Marketstack => Self::marketstack_default(),
            ProviderId::Alphavantage => Self::alphavantage_default(),
            ProviderId::Openai => Self::openai_default(),
        }
    }

    pub fn request_timeout_ms(&self) -> u64 {
        u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}
