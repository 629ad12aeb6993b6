//! Upstream contracts and request/response types.
//!
//! # Endpoints
//!
//! | Endpoint | Request | Response | Description |
//! |----------|---------|----------|-------------|
//! | BatchPrices | `[Symbol]` | `Vec<PriceSnapshot>` | Current price of N symbols in one call |
//! | Quote | [`Symbol`] | [`Quote`] | Latest end-of-day quote |
//! | Historical | [`HistoricalRequest`] | `Vec<HistoricalPoint>` | Close series, oldest first |
//! | Overview | [`Symbol`] | [`CompanyOverview`] | Company profile |
//!
//! The price refresh cache only needs [`PriceSource`]; the web layer talks to
//! full [`MarketDataSource`] adapters through [`crate::SourceSet`].

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{
    Analysis, AnalysisRequest, CompanyOverview, HistoricalPoint, HistoricalRange, Listing,
    PriceSnapshot, ProviderId, Quote, Symbol,
};

/// Boxed future returned by every upstream call.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Data endpoint type used for routing and capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    BatchPrices,
    Quote,
    Historical,
    Overview,
}

impl Endpoint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BatchPrices => "batch_prices",
            Self::Quote => "quote",
            Self::Historical => "historical",
            Self::Overview => "overview",
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported endpoint matrix for a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub batch_prices: bool,
    pub quote: bool,
    pub historical: bool,
    pub overview: bool,
}

impl CapabilitySet {
    pub const fn new(batch_prices: bool, quote: bool, historical: bool, overview: bool) -> Self {
        Self {
            batch_prices,
            quote,
            historical,
            overview,
        }
    }

    pub const fn full() -> Self {
        Self::new(true, true, true, true)
    }

    pub const fn supports(self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::BatchPrices => self.batch_prices,
            Endpoint::Quote => self.quote,
            Endpoint::Historical => self.historical,
            Endpoint::Overview => self.overview,
        }
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    UnsupportedEndpoint,
    Unavailable,
    RateLimited,
    InvalidRequest,
    NotFound,
    Misconfigured,
    Malformed,
    Internal,
}

/// Structured upstream error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unsupported_endpoint(provider: ProviderId, endpoint: Endpoint) -> Self {
        Self {
            kind: SourceErrorKind::UnsupportedEndpoint,
            message: format!("endpoint '{endpoint}' is not supported by {provider}"),
            retryable: false,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::NotFound,
            message: message.into(),
            retryable: false,
        }
    }

    /// A required setting (usually an API key) is missing.
    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Misconfigured,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Malformed,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::UnsupportedEndpoint => "source.unsupported_endpoint",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::Misconfigured => "source.misconfigured",
            SourceErrorKind::Malformed => "source.malformed",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Request payload for historical series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalRequest {
    pub symbol: Symbol,
    pub range: HistoricalRange,
}

impl HistoricalRequest {
    pub fn new(symbol: Symbol, range: HistoricalRange) -> Self {
        Self { symbol, range }
    }

    /// Response-cache key for this symbol/range combination.
    pub fn cache_key(&self) -> String {
        format!("historical:{}:{}", self.symbol, self.range)
    }
}

/// Batch price fetch consumed by the price refresh cache.
///
/// Implementations may return symbols in any order and may omit requested
/// symbols; omitted symbols simply are not refreshed.
pub trait PriceSource: Send + Sync {
    fn fetch_batch_prices<'a>(&'a self, symbols: &'a [Symbol])
        -> SourceFuture<'a, Vec<PriceSnapshot>>;
}

/// Full market-data adapter contract.
///
/// Adapters implement every method and return
/// [`SourceError::unsupported_endpoint`] for endpoints missing from
/// [`capabilities`](MarketDataSource::capabilities).
pub trait MarketDataSource: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet;

    fn batch_prices<'a>(&'a self, symbols: &'a [Symbol]) -> SourceFuture<'a, Vec<PriceSnapshot>>;

    fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Quote>;

    /// Close series ordered oldest first.
    fn historical<'a>(&'a self, req: &'a HistoricalRequest)
        -> SourceFuture<'a, Vec<HistoricalPoint>>;

    fn company_overview<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, CompanyOverview>;
}

/// Language-model backend for `/api/analysis` and `/api/chat`.
pub trait AnalysisEngine: Send + Sync {
    fn analyze<'a>(&'a self, req: &'a AnalysisRequest) -> SourceFuture<'a, Analysis>;

    /// Single-turn reply to a free-form user message.
    fn chat<'a>(&'a self, message: &'a str) -> SourceFuture<'a, String>;
}

/// Upstream feed of newly listed companies.
pub trait ListingSource: Send + Sync {
    fn recent_listings(&self) -> SourceFuture<'_, Vec<Listing>>;
}
