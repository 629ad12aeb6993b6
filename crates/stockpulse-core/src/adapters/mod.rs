//! Provider adapters.
//!
//! | Adapter | Endpoints |
//! |---------|-----------|
//! | [`MarketstackAdapter`] | batch prices, quote, historical, IPO listings |
//! | [`AlphaVantageAdapter`] | quote, historical, overview |
//! | [`OpenAiAnalysisEngine`] | sentiment analysis, chat |

mod alphavantage;
mod marketstack;
mod openai;

pub use alphavantage::AlphaVantageAdapter;
pub use marketstack::MarketstackAdapter;
pub use openai::{
    OpenAiAnalysisEngine, DEFAULT_CHAT_MODEL as DEFAULT_OPENAI_CHAT_MODEL,
    DEFAULT_MODEL as DEFAULT_OPENAI_MODEL,
};

use std::env;

use tracing::debug;

use crate::data_source::SourceError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::throttling::Throttle;
use crate::ProviderId;

/// Read a provider API key from the environment, primary variable first.
///
/// Blank values count as missing.
pub fn api_key_from_env(provider: ProviderId) -> Option<String> {
    provider
        .api_key_vars()
        .into_iter()
        .filter_map(|name| env::var(name).ok())
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty())
}

pub(crate) fn require_key(provider: ProviderId, key: Option<&str>) -> Result<&str, SourceError> {
    key.filter(|key| !key.is_empty()).ok_or_else(|| {
        let [primary, fallback] = provider.api_key_vars();
        SourceError::misconfigured(format!(
            "{provider} API key is not configured; set {primary} or {fallback}"
        ))
    })
}

/// Throttle, send, and classify the HTTP status of one upstream call.
pub(crate) async fn execute_checked(
    provider: ProviderId,
    throttle: &Throttle,
    http_client: &dyn HttpClient,
    request: HttpRequest,
) -> Result<HttpResponse, SourceError> {
    if let Err(wait) = throttle.acquire() {
        return Err(SourceError::rate_limited(format!(
            "{provider} request budget exhausted; retry in {:.2}s",
            wait.as_secs_f64()
        )));
    }

    debug!(provider = %provider, url = %request.redacted_url(), "upstream request");
    let response = http_client.execute(request).await.map_err(|error| {
        if error.retryable() {
            SourceError::unavailable(format!("{provider} transport error: {}", error.message()))
        } else {
            SourceError::internal(format!("{provider} transport error: {}", error.message()))
        }
    })?;

    if response.is_success() {
        return Ok(response);
    }

    Err(match response.status {
        401 | 403 => SourceError::misconfigured(format!(
            "{provider} rejected the configured credentials (status {})",
            response.status
        )),
        404 => SourceError::not_found(format!("{provider} has no data for this request")),
        429 => SourceError::rate_limited(format!("{provider} rate limit reached")),
        400..=499 => SourceError::invalid_request(format!(
            "{provider} rejected the request with status {}",
            response.status
        )),
        status => SourceError::unavailable(format!("{provider} returned status {status}")),
    })
}

pub(crate) fn parse_body<T: serde::de::DeserializeOwned>(
    provider: ProviderId,
    body: &str,
) -> Result<T, SourceError> {
    serde_json::from_str(body)
        .map_err(|error| SourceError::malformed(format!("failed to parse {provider} response: {error}")))
}
