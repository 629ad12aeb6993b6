use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{api_key_from_env, execute_checked, parse_body, require_key};
use crate::data_source::{
    CapabilitySet, Endpoint, HistoricalRequest, MarketDataSource, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::throttling::Throttle;
use crate::{
    CompanyOverview, HistoricalPoint, PriceSnapshot, ProviderId, Quote, Symbol, UtcDateTime,
};

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
/// `outputsize=compact` returns at most this many daily points.
const COMPACT_POINTS: usize = 100;

/// Alpha Vantage adapter: company overview, global quote and daily series.
#[derive(Clone)]
pub struct AlphaVantageAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
    base_url: String,
    policy: ProviderPolicy,
    throttle: Throttle,
}

impl AlphaVantageAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        let policy = ProviderPolicy::alphavantage_default();
        Self {
            http_client,
            api_key,
            base_url: String::from(DEFAULT_BASE_URL),
            throttle: Throttle::from_policy(&policy),
            policy,
        }
    }

    pub fn from_env(http_client: Arc<dyn HttpClient>) -> Self {
        Self::new(http_client, api_key_from_env(ProviderId::Alphavantage))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_policy(mut self, policy: ProviderPolicy) -> Self {
        self.throttle = Throttle::from_policy(&policy);
        self.policy = policy;
        self
    }

    /// Call one `function` and decode its body, mapping the in-band error
    /// envelopes Alpha Vantage returns with status 200.
    async fn query<T>(&self, function: &str, symbol: &Symbol, extra: &str) -> Result<T, SourceError>
    where
        T: DeserializeOwned,
    {
        let key = require_key(ProviderId::Alphavantage, self.api_key.as_deref())?;
        let url = format!(
            "{}?function={function}&symbol={}{extra}&apikey={}",
            self.base_url,
            urlencoding::encode(symbol.as_str()),
            urlencoding::encode(key)
        );

        let request = HttpRequest::get(url).with_timeout_ms(self.policy.request_timeout_ms());
        let response = execute_checked(
            ProviderId::Alphavantage,
            &self.throttle,
            self.http_client.as_ref(),
            request,
        )
        .await?;

        let body: Value = parse_body(ProviderId::Alphavantage, &response.body)?;
        check_envelope(&body, symbol)?;
        serde_json::from_value(body).map_err(|error| {
            SourceError::malformed(format!("failed to decode alphavantage {function}: {error}"))
        })
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, SourceError> {
        let response: GlobalQuoteResponse = self.query("GLOBAL_QUOTE", symbol, "").await?;
        let quote = response
            .quote
            .filter(|quote| quote.price.is_some())
            .ok_or_else(|| SourceError::not_found(format!("no quote available for {symbol}")))?;
        normalize_quote(symbol, quote)
    }

    async fn fetch_historical(
        &self,
        req: &HistoricalRequest,
    ) -> Result<Vec<HistoricalPoint>, SourceError> {
        let limit = req.range.point_limit();
        let output_size = if limit > COMPACT_POINTS {
            "&outputsize=full"
        } else {
            "&outputsize=compact"
        };
        let response: DailySeriesResponse = self
            .query("TIME_SERIES_DAILY", &req.symbol, output_size)
            .await?;

        let series = response.series.unwrap_or_default();
        let skip = series.len().saturating_sub(limit);
        let points = series
            .into_iter()
            .skip(skip)
            .filter_map(|(date, bar)| {
                let price = bar.close.trim().parse::<f64>().ok()?;
                Some(HistoricalPoint { date, price })
            })
            .collect::<Vec<_>>();

        if points.is_empty() {
            return Err(SourceError::not_found(format!(
                "no {} history available for {}",
                req.range, req.symbol
            )));
        }
        Ok(points)
    }

    async fn fetch_overview(&self, symbol: &Symbol) -> Result<CompanyOverview, SourceError> {
        let response: OverviewResponse = self.query("OVERVIEW", symbol, "").await?;
        Ok(CompanyOverview {
            name: response.name.unwrap_or_default(),
            description: response.description.unwrap_or_default(),
            sector: response.sector.unwrap_or_default(),
            industry: response.industry.unwrap_or_default(),
        })
    }
}

impl MarketDataSource for AlphaVantageAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Alphavantage
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(false, true, true, true)
    }

    fn batch_prices<'a>(&'a self, _symbols: &'a [Symbol]) -> SourceFuture<'a, Vec<PriceSnapshot>> {
        Box::pin(async move {
            Err(SourceError::unsupported_endpoint(
                ProviderId::Alphavantage,
                Endpoint::BatchPrices,
            ))
        })
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

    fn company_overview<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, CompanyOverview> {
        Box::pin(self.fetch_overview(symbol))
    }
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote", default)]
    quote: Option<GlobalQuote>,
}

// Every Global Quote field arrives as a string.
#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailySeriesResponse {
    #[serde(rename = "Time Series (Daily)", default)]
    series: Option<BTreeMap<String, DailyBar>>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "4. close")]
    close: String,
}

#[derive(Debug, Deserialize)]
struct OverviewResponse {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Description")]
    description: Option<String>,
    #[serde(rename = "Sector")]
    sector: Option<String>,
    #[serde(rename = "Industry")]
    industry: Option<String>,
}

fn check_envelope(body: &Value, symbol: &Symbol) -> Result<(), SourceError> {
    let Some(object) = body.as_object() else {
        return Err(SourceError::malformed("alphavantage response is not an object"));
    };

    for notice in ["Note", "Information"] {
        if let Some(text) = object.get(notice).and_then(Value::as_str) {
            return Err(SourceError::rate_limited(format!("alphavantage: {text}")));
        }
    }
    if let Some(text) = object.get("Error Message").and_then(Value::as_str) {
        return Err(SourceError::not_found(format!(
            "alphavantage has no data for {symbol}: {text}"
        )));
    }
    if object.is_empty() {
        return Err(SourceError::not_found(format!(
            "alphavantage has no data for {symbol}"
        )));
    }
    Ok(())
}

fn parse_number(field: &str, raw: Option<&str>) -> Result<f64, SourceError> {
    let raw = raw.ok_or_else(|| SourceError::malformed(format!("alphavantage quote has no {field}")))?;
    raw.trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|_| SourceError::malformed(format!("alphavantage {field} is not a number: {raw}")))
}

fn normalize_quote(symbol: &Symbol, quote: GlobalQuote) -> Result<Quote, SourceError> {
    let price = parse_number("price", quote.price.as_deref())?;
    let change = parse_number("change", quote.change.as_deref()).unwrap_or(0.0);
    let change_percent =
        parse_number("change percent", quote.change_percent.as_deref()).unwrap_or(0.0);

    let last_updated = match quote.latest_trading_day.as_deref() {
        Some(day) => UtcDateTime::parse_upstream(&format!("{day}T00:00:00Z")).map_err(|error| {
            SourceError::malformed(format!("alphavantage trading day: {error}"))
        })?,
        None => UtcDateTime::now(),
    };

    Ok(Quote {
        symbol: symbol.clone(),
        price,
        change,
        change_percent,
        high: parse_number("high", quote.high.as_deref()).ok(),
        low: parse_number("low", quote.low.as_deref()).ok(),
        volume: quote
            .volume
            .as_deref()
            .and_then(|volume| volume.trim().parse::<u64>().ok()),
        last_updated,
    })
}
