//! Price refresh cache over HTTP: reads and watch lifecycle.

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use stockpulse_core::{PriceSnapshot, Symbol};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PricesParams {
    symbols: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PricesResponse {
    /// `null` for symbols that were never watched.
    prices: BTreeMap<Symbol, Option<PriceSnapshot>>,
}

#[derive(Debug, Deserialize)]
pub struct WatchRequest {
    symbols: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WatchResponse {
    tracked: Vec<Symbol>,
}

/// Pure cache read; never reaches upstream.
pub async fn get_prices(
    State(state): State<AppState>,
    params: Result<Query<PricesParams>, QueryRejection>,
) -> Result<Json<PricesResponse>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::invalid("query", rejection.body_text()))?;
    let raw = params
        .symbols
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ApiError::MissingParameter("symbols"))?;

    let prices = Symbol::parse_list(raw)?
        .into_iter()
        .map(|symbol| {
            let snapshot = state.prices.get_price(&symbol);
            (symbol, snapshot)
        })
        .collect();
    Ok(Json(PricesResponse { prices }))
}

pub async fn start_watch(
    State(state): State<AppState>,
    payload: Result<Json<WatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WatchResponse>), ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::invalid("body", rejection.body_text()))?;
    if request.symbols.is_empty() {
        return Err(ApiError::MissingParameter("symbols"));
    }

    let symbols = request
        .symbols
        .iter()
        .map(|raw| Symbol::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;
    state.prices.start_updates(symbols);

    let tracked = state.prices.tracked_symbols();
    Ok((StatusCode::ACCEPTED, Json(WatchResponse { tracked })))
}

pub async fn stop_watch(State(state): State<AppState>) -> StatusCode {
    state.prices.stop_updates();
    StatusCode::NO_CONTENT
}
