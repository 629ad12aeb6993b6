use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use stockpulse_core::{CoreError, SourceError, SourceErrorKind, ValidationError};
use thiserror::Error;
use tracing::{error, warn};

/// Handler error, rendered as `{error, details}` JSON with a matching status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} is required")]
    MissingParameter(&'static str),

    #[error("invalid {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// Analysis failures are always reported as 500.
    #[error("analysis failed: {0}")]
    Analysis(SourceError),

    #[error("chat failed: {0}")]
    Chat(SourceError),

    #[error("IPO update failed: {0}")]
    IpoUpdate(SourceError),
}

impl ApiError {
    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_) | Self::InvalidParameter { .. } | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Source(source) => match source.kind() {
                SourceErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
                SourceErrorKind::NotFound => StatusCode::NOT_FOUND,
                SourceErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                SourceErrorKind::UnsupportedEndpoint
                | SourceErrorKind::Unavailable
                | SourceErrorKind::Misconfigured
                | SourceErrorKind::Malformed
                | SourceErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Analysis(_) | Self::Chat(_) | Self::IpoUpdate(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) | Self::InvalidParameter { .. } | Self::Validation(_) => {
                "Invalid request"
            }
            Self::Source(source) => match source.kind() {
                SourceErrorKind::NotFound => "No data available for this symbol",
                SourceErrorKind::RateLimited => "Upstream rate limit reached",
                SourceErrorKind::Misconfigured => "API configuration error",
                _ => "Failed to fetch upstream data",
            },
            Self::Analysis(_) => "Failed to generate analysis",
            Self::Chat(_) => "Failed to get response from AI",
            Self::IpoUpdate(_) => "Failed to update IPO data",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        } else {
            warn!(%status, error = %self, "request rejected");
        }

        let details = match &self {
            Self::Source(source)
            | Self::Analysis(source)
            | Self::Chat(source)
            | Self::IpoUpdate(source) => source.message().to_owned(),
            other => other.to_string(),
        };
        let body = json!({ "error": self.summary(), "details": details });
        (status, Json(body)).into_response()
    }
}

/// Startup failures of the `stockpulse` binary, mapped to exit codes.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid --watch list: {0}")]
    Watch(#[from] ValidationError),

    #[error("failed to load listings: {0}")]
    Listings(#[from] CoreError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

impl StartupError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Watch(_) => 2,
            Self::Listings(_) => 3,
            Self::Io(_) => 10,
        }
    }
}
