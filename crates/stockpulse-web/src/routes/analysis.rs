//! `POST /api/analysis`: AI sentiment analysis of submitted market data.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use stockpulse_core::{Analysis, AnalysisRequest};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn post_analysis(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<Analysis>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::invalid("body", rejection.body_text()))?;

    info!(symbol = %request.symbol, "generating analysis");
    let analysis = state
        .analysis
        .analyze(&request)
        .await
        .map_err(ApiError::Analysis)?;
    Ok(Json(analysis))
}
