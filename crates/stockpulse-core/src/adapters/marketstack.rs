use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use super::{api_key_from_env, execute_checked, parse_body, require_key};
use crate::data_source::{
    CapabilitySet, Endpoint, HistoricalRequest, ListingSource, MarketDataSource, PriceSource,
    SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::throttling::Throttle;
use crate::{
    CompanyOverview, HistoricalPoint, Listing, PriceSnapshot, ProviderId, Quote, Symbol,
    UtcDateTime,
};

const DEFAULT_BASE_URL: &str = "https://api.marketstack.com/v1";
const IPO_PAGE_LIMIT: &str = "100";

/// Marketstack adapter: batch intraday prices, end-of-day quotes and series,
/// plus the IPO feed.
#[derive(Clone)]
pub struct MarketstackAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
    base_url: String,
    policy: ProviderPolicy,
    throttle: Throttle,
}

impl MarketstackAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        let policy = ProviderPolicy::marketstack_default();
        Self {
            http_client,
            api_key,
            base_url: String::from(DEFAULT_BASE_URL),
            throttle: Throttle::from_policy(&policy),
            policy,
        }
    }

    /// Build with the key from `STOCKPULSE_MARKETSTACK_API_KEY` / `MARKETSTACK_API_KEY`.
    pub fn from_env(http_client: Arc<dyn HttpClient>) -> Self {
        Self::new(http_client, api_key_from_env(ProviderId::Marketstack))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_policy(mut self, policy: ProviderPolicy) -> Self {
        self.throttle = Throttle::from_policy(&policy);
        self.policy = policy;
        self
    }

    async fn get_page<T>(&self, path: &str, params: &[(&str, String)]) -> Result<Vec<T>, SourceError>
    where
        T: serde::de::DeserializeOwned,
    {
        let key = require_key(ProviderId::Marketstack, self.api_key.as_deref())?;
        let mut url = format!(
            "{}/{path}?access_key={}",
            self.base_url,
            urlencoding::encode(key)
        );
        for (name, value) in params {
            url.push_str(&format!("&{name}={}", urlencoding::encode(value)));
        }

        let request = HttpRequest::get(url).with_timeout_ms(self.policy.request_timeout_ms());
        let response = execute_checked(
            ProviderId::Marketstack,
            &self.throttle,
            self.http_client.as_ref(),
            request,
        )
        .await?;

        let page: MarketstackPage<T> = parse_body(ProviderId::Marketstack, &response.body)?;
        if let Some(error) = page.error {
            return Err(classify_api_error(error));
        }
        Ok(page.data.unwrap_or_default())
    }

    async fn fetch_batch(&self, symbols: &[Symbol]) -> Result<Vec<PriceSnapshot>, SourceError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let joined = join_symbols(symbols);

        let current: Vec<IntradayRow> = self
            .get_page("intraday/latest", &[("symbols", joined.clone())])
            .await?;
        if current.is_empty() {
            return Err(SourceError::not_found(
                "marketstack has no intraday data for the requested symbols",
            ));
        }

        let previous: Vec<EodRow> = self
            .get_page("eod/latest", &[("symbols", joined)])
            .await?;
        let previous_close: HashMap<String, f64> = previous
            .into_iter()
            .filter_map(|row| Some((row.symbol.to_ascii_uppercase(), row.close?)))
            .collect();

        let mut snapshots = Vec::with_capacity(current.len());
        for row in current {
            let raw_symbol = row.symbol.clone();
            match normalize_intraday(row, &previous_close) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(reason) => {
                    warn!(symbol = %raw_symbol, %reason, "skipping malformed marketstack row");
                }
            }
        }
        Ok(snapshots)
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, SourceError> {
        let rows: Vec<EodRow> = self
            .get_page(
                "eod",
                &[
                    ("symbols", symbol.to_string()),
                    ("limit", String::from("2")),
                ],
            )
            .await?;

        let mut rows = rows.into_iter();
        let latest = rows
            .next()
            .ok_or_else(|| SourceError::not_found(format!("no quote available for {symbol}")))?;
        let price = latest
            .close
            .ok_or_else(|| SourceError::malformed("marketstack eod row has no close"))?;
        let last_updated = parse_row_date(latest.date.as_deref())?;

        let (change, change_percent) = match rows.next().and_then(|row| row.close) {
            Some(previous) if previous > 0.0 => {
                let change = price - previous;
                (change, change / previous * 100.0)
            }
            _ => (0.0, 0.0),
        };

        Ok(Quote {
            symbol: symbol.clone(),
            price,
            change,
            change_percent,
            high: latest.high,
            low: latest.low,
            volume: latest.volume.map(|volume| volume.max(0.0) as u64),
            last_updated,
        })
    }

    async fn fetch_historical(
        &self,
        req: &HistoricalRequest,
    ) -> Result<Vec<HistoricalPoint>, SourceError> {
        let today = UtcDateTime::now();
        let rows: Vec<EodRow> = self
            .get_page(
                "eod",
                &[
                    ("symbols", req.symbol.to_string()),
                    (
                        "date_from",
                        today.minus_days(req.range.lookback_days()).date_string(),
                    ),
                    ("date_to", today.date_string()),
                    ("limit", req.range.point_limit().to_string()),
                ],
            )
            .await?;

        let mut points = rows
            .into_iter()
            .filter_map(|row| {
                let price = row.close?;
                let date = UtcDateTime::parse_upstream(row.date.as_deref()?).ok()?;
                Some(HistoricalPoint {
                    date: date.date_string(),
                    price,
                })
            })
            .collect::<Vec<_>>();

        if points.is_empty() {
            return Err(SourceError::not_found(format!(
                "no {} history available for {}",
                req.range, req.symbol
            )));
        }

        // Marketstack returns newest first.
        points.reverse();
        Ok(points)
    }

    async fn fetch_ipos(&self) -> Result<Vec<Listing>, SourceError> {
        let rows: Vec<IpoRow> = self
            .get_page("ipos", &[("limit", String::from(IPO_PAGE_LIMIT))])
            .await?;
        if rows.is_empty() {
            return Err(SourceError::not_found("marketstack has no IPO data"));
        }

        let mut listings = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_symbol = row.symbol.clone();
            match normalize_ipo(row) {
                Ok(listing) => listings.push(listing),
                Err(reason) => {
                    warn!(symbol = %raw_symbol, %reason, "skipping malformed marketstack IPO row");
                }
            }
        }
        Ok(listings)
    }
}

impl MarketDataSource for MarketstackAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Marketstack
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(true, true, true, false)
    }

    fn batch_prices<'a>(&'a self, symbols: &'a [Symbol]) -> SourceFuture<'a, Vec<PriceSnapshot>> {
        Box::pin(self.fetch_batch(symbols))
    }

    fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Quote> {
        Box::pin(self.fetch_quote(symbol))
    }

    fn historical<'a>(
        &'a self,
        req: &'a HistoricalRequest,
    ) -> SourceFuture<'a, Vec<HistoricalPoint>> {
        Box::pin(self.fetch_historical(req))
    }

    fn company_overview<'a>(&'a self, _symbol: &'a Symbol) -> SourceFuture<'a, CompanyOverview> {
        Box::pin(async move {
            Err(SourceError::unsupported_endpoint(
                ProviderId::Marketstack,
                Endpoint::Overview,
            ))
        })
    }
}

impl PriceSource for MarketstackAdapter {
    fn fetch_batch_prices<'a>(
        &'a self,
        symbols: &'a [Symbol],
    ) -> SourceFuture<'a, Vec<PriceSnapshot>> {
        Box::pin(self.fetch_batch(symbols))
    }
}

impl ListingSource for MarketstackAdapter {
    fn recent_listings(&self) -> SourceFuture<'_, Vec<Listing>> {
        Box::pin(self.fetch_ipos())
    }
}

#[derive(Debug, Deserialize)]
struct MarketstackPage<T> {
    data: Option<Vec<T>>,
    error: Option<MarketstackApiError>,
}

#[derive(Debug, Deserialize)]
struct MarketstackApiError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct IntradayRow {
    symbol: String,
    last: Option<f64>,
    close: Option<f64>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EodRow {
    symbol: String,
    close: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    volume: Option<f64>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpoRow {
    symbol: String,
    name: Option<String>,
    sector: Option<String>,
    listing_date: Option<String>,
    price: Option<f64>,
}

fn join_symbols(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(Symbol::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn classify_api_error(error: MarketstackApiError) -> SourceError {
    let message = format!("marketstack error {}: {}", error.code, error.message);
    match error.code.as_str() {
        "rate_limit_reached" | "usage_limit_reached" | "too_many_requests" => {
            SourceError::rate_limited(message)
        }
        "invalid_access_key" | "missing_access_key" | "inactive_user" => {
            SourceError::misconfigured(message)
        }
        "no_valid_symbols_provided" | "validation_error" => SourceError::invalid_request(message),
        _ => SourceError::unavailable(message),
    }
}

fn parse_row_date(date: Option<&str>) -> Result<UtcDateTime, SourceError> {
    let raw = date.ok_or_else(|| SourceError::malformed("marketstack row has no date"))?;
    UtcDateTime::parse_upstream(raw)
        .map_err(|error| SourceError::malformed(format!("marketstack row date: {error}")))
}

fn normalize_intraday(
    row: IntradayRow,
    previous_close: &HashMap<String, f64>,
) -> Result<PriceSnapshot, String> {
    let symbol = Symbol::parse(&row.symbol).map_err(|error| error.to_string())?;
    let price = row
        .last
        .or(row.close)
        .ok_or_else(|| String::from("row has neither last nor close price"))?;
    let previous = previous_close
        .get(symbol.as_str())
        .copied()
        .ok_or_else(|| String::from("no previous close reported"))?;
    let last_updated = parse_row_date(row.date.as_deref()).map_err(|error| error.to_string())?;

    PriceSnapshot::from_closes(symbol, price, previous, last_updated)
        .map_err(|error| error.to_string())
}

fn normalize_ipo(row: IpoRow) -> Result<Listing, String> {
    let symbol = Symbol::parse(&row.symbol).map_err(|error| error.to_string())?;
    let raw_date = row
        .listing_date
        .ok_or_else(|| String::from("row has no listing date"))?;
    // The feed mixes full timestamps and bare dates.
    let listing_date = UtcDateTime::parse_upstream(&raw_date)
        .or_else(|_| UtcDateTime::parse(&format!("{raw_date}T00:00:00Z")))
        .map_err(|error| error.to_string())?;
    let sector = row
        .sector
        .map(|sector| sector.trim().to_owned())
        .filter(|sector| !sector.is_empty())
        .unwrap_or_else(|| String::from("Unknown"));

    Ok(Listing {
        name: row.name.unwrap_or_else(|| symbol.to_string()),
        symbol,
        sector,
        listing_date,
        price: row.price,
        change: Some(0.0),
    })
}
