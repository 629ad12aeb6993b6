//! `GET /api/stocks`: recently listed companies, searchable and paginated.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use stockpulse_core::{ListingPage, ListingQuery};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn get_stocks(
    State(state): State<AppState>,
    query: Result<Query<ListingQuery>, QueryRejection>,
) -> Result<Json<ListingPage>, ApiError> {
    let Query(query) = query.map_err(|rejection| ApiError::invalid("query", rejection.body_text()))?;
    let listings = state.listings.read().await;
    Ok(Json(listings.query(&query, state.clock.now())))
}
