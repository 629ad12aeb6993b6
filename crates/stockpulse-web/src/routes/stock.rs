//! `GET /api/stock`: quote, company overview or historical closes for one symbol.
//!
//! Quotes are cached with the response cache's default TTL, overviews for a
//! day and historical series per range.

use std::str::FromStr;
use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use stockpulse_core::{HistoricalRange, HistoricalRequest, SourceError, Symbol};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Company profiles change rarely.
const OVERVIEW_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataKind {
    #[default]
    Quote,
    Overview,
    Historical,
}

impl FromStr for DataKind {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quote" => Ok(Self::Quote),
            "overview" => Ok(Self::Overview),
            "historical" => Ok(Self::Historical),
            other => Err(ApiError::invalid(
                "type",
                format!("'{other}', expected quote, overview or historical"),
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StockParams {
    symbol: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    range: Option<String>,
}

pub async fn get_stock(
    State(state): State<AppState>,
    params: Result<Query<StockParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::invalid("query", rejection.body_text()))?;
    let raw_symbol = params
        .symbol
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ApiError::MissingParameter("symbol"))?;
    let symbol = Symbol::parse(raw_symbol)?;
    let kind = match params.kind.as_deref() {
        Some(raw) => raw.parse()?,
        None => DataKind::default(),
    };

    let body = match kind {
        DataKind::Quote => {
            let key = format!("quote:{symbol}");
            state
                .responses
                .get_or_try_insert_with(&key, None, || async {
                    debug!(%symbol, "quote cache miss");
                    to_json(state.sources.quote(&symbol).await?)
                })
                .await?
        }
        DataKind::Overview => {
            let key = format!("overview:{symbol}");
            state
                .responses
                .get_or_try_insert_with(&key, Some(OVERVIEW_TTL), || async {
                    debug!(%symbol, "overview cache miss");
                    to_json(state.sources.company_overview(&symbol).await?)
                })
                .await?
        }
        DataKind::Historical => {
            let range = match params.range.as_deref() {
                Some(raw) => raw.parse::<HistoricalRange>()?,
                None => HistoricalRange::default(),
            };
            let req = HistoricalRequest::new(symbol, range);
            state
                .responses
                .get_or_try_insert_with(&req.cache_key(), Some(range.cache_ttl()), || async {
                    debug!(symbol = %req.symbol, %range, "historical cache miss");
                    to_json(state.sources.historical(&req).await?)
                })
                .await?
        }
    };

    Ok(Json(body))
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|error| ApiError::Source(SourceError::internal(error.to_string())))
}
