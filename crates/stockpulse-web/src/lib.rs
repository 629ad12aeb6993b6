//! # StockPulse Web
//!
//! axum server exposing the dashboard API on top of `stockpulse-core`.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | `clap` server arguments |
//! | [`error`] | Handler and startup errors |
//! | [`routes`] | HTTP handlers |
//! | [`state`] | Shared handler state |

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::ServerArgs;
pub use error::{ApiError, StartupError};
pub use state::AppState;

/// Full application router with tracing and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
