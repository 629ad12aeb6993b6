//! `POST /api/ipos/update`: pull the upstream IPO feed into the listing table.
//!
//! Symbols already present are left untouched. Additions live in memory
//! only and are lost on restart.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use stockpulse_core::SourceError;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IpoUpdate {
    pub message: &'static str,
    pub added: usize,
}

pub async fn update_ipos(State(state): State<AppState>) -> Result<Json<IpoUpdate>, ApiError> {
    let source = state
        .ipo_source
        .as_ref()
        .ok_or_else(|| ApiError::IpoUpdate(SourceError::misconfigured("no IPO feed configured")))?;

    let fetched = source.recent_listings().await.map_err(ApiError::IpoUpdate)?;
    let received = fetched.len();
    let added = state.listings.write().await.insert_new(fetched);

    info!(received, added, "IPO listings updated");
    Ok(Json(IpoUpdate {
        message: "IPO data updated successfully",
        added,
    }))
}
