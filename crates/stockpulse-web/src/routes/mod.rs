//! HTTP handlers.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /health` | [`health`] |
//! | `GET /api/stock` | [`stock::get_stock`] |
//! | `POST /api/analysis` | [`analysis::post_analysis`] |
//! | `POST /api/chat` | [`chat::post_chat`] |
//! | `GET /api/stocks` | [`stocks::get_stocks`] |
//! | `POST /api/ipos/update` | [`ipos::update_ipos`] |
//! | `GET /api/prices` | [`prices::get_prices`] |
//! | `POST /api/prices/watch` | [`prices::start_watch`] |
//! | `DELETE /api/prices/watch` | [`prices::stop_watch`] |

pub mod analysis;
pub mod chat;
pub mod ipos;
pub mod prices;
pub mod stock;
pub mod stocks;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/stock", get(stock::get_stock))
        .route("/analysis", post(analysis::post_analysis))
        .route("/chat", post(chat::post_chat))
        .route("/stocks", get(stocks::get_stocks))
        .route("/ipos/update", post(ipos::update_ipos))
        .route("/prices", get(prices::get_prices))
        .route(
            "/prices/watch",
            post(prices::start_watch).delete(prices::stop_watch),
        )
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
