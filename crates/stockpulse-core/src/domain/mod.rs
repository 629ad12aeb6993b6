//! # Domain Models
//!
//! Canonical types shared by the caches, the upstream adapters and the web
//! layer.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated uppercase ticker |
//! | [`UtcDateTime`] | UTC timestamp |
//! | [`PriceSnapshot`] | Last-known price of a tracked symbol |
//! | [`Quote`] | End-of-day quote with range and volume |
//! | [`HistoricalPoint`] | `{date, price}` point of a close series |
//! | [`HistoricalRange`] | Lookback window (`1d` .. `5y`) |
//! | [`CompanyOverview`] | Company profile |
//! | [`Analysis`] | AI sentiment analysis |
//! | [`Listing`] | Recently listed company |

mod models;
mod range;
mod symbol;
mod timestamp;

pub use models::{
    Analysis, AnalysisRequest, CompanyOverview, HistoricalPoint, Listing, NewsItem,
    PriceSnapshot, Quote, Sentiment, StockData,
};
pub use range::HistoricalRange;
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
