//! # StockPulse Core
//!
//! Caching and upstream plumbing behind the StockPulse dashboard backend.
//!
//! ## Overview
//!
//! - **Price refresh cache** holding the latest price of every watched
//!   symbol, refreshed in paced batches while the exchange is open
//! - **TTL cache** for historical series and company overviews
//! - **Provider adapters** for Marketstack, Alpha Vantage and OpenAI behind
//!   small async traits
//! - **Source routing** with capability checks and fallback
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Marketstack, Alpha Vantage and OpenAI adapters |
//! | [`cache`] | Generic TTL cache |
//! | [`clock`] | Wall-clock abstraction |
//! | [`data_source`] | Upstream traits, request types and `SourceError` |
//! | [`domain`] | Domain models (Symbol, PriceSnapshot, Quote, ...) |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`listings`] | IPO listing store |
//! | [`market_hours`] | Exchange session gate |
//! | [`price_cache`] | Batched price refresh cache |
//! | [`provider_policy`] | Per-provider budgets and timeouts |
//! | [`routing`] | Capability-based source selection |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Client-side rate limiting |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stockpulse_core::{MarketstackAdapter, PriceRefreshCache, ReqwestHttpClient, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = MarketstackAdapter::from_env(Arc::new(ReqwestHttpClient::new()));
//!     let prices = PriceRefreshCache::new(Arc::new(source));
//!
//!     prices.start_updates(Symbol::parse_list("AAPL,MSFT")?);
//!     if let Some(snapshot) = prices.get_price(&Symbol::parse("AAPL")?) {
//!         println!("AAPL {:.2}", snapshot.price);
//!     }
//!     prices.stop_updates();
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cache;
pub mod clock;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod listings;
pub mod market_hours;
pub mod price_cache;
pub mod provider_policy;
pub mod routing;
pub mod source;
pub mod throttling;

pub use adapters::{
    api_key_from_env, AlphaVantageAdapter, MarketstackAdapter, OpenAiAnalysisEngine,
    DEFAULT_OPENAI_CHAT_MODEL, DEFAULT_OPENAI_MODEL,
};
pub use cache::{CacheStore, DEFAULT_TTL};
pub use clock::{Clock, FixedClock, SystemClock};
pub use data_source::{
    AnalysisEngine, CapabilitySet, Endpoint, HistoricalRequest, ListingSource, MarketDataSource,
    PriceSource, SourceError, SourceErrorKind, SourceFuture,
};
pub use domain::{
    Analysis, AnalysisRequest, CompanyOverview, HistoricalPoint, HistoricalRange, Listing,
    NewsItem, PriceSnapshot, Quote, Sentiment, StockData, Symbol, UtcDateTime,
};
pub use error::{CoreError, ValidationError};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
    StaticHttpClient,
};
pub use listings::{ListingPage, ListingQuery, ListingStore};
pub use market_hours::MarketHours;
pub use price_cache::{
    CycleOutcome, CycleReport, PriceCacheBuilder, PriceCacheConfig, PriceRefreshCache,
};
pub use provider_policy::ProviderPolicy;
pub use routing::SourceSet;
pub use source::ProviderId;
pub use throttling::Throttle;
