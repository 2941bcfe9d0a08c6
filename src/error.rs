use crate::cache::CacheError;
use crate::datasource::LedgerReadError;
use crate::domain::ValidationError;
use crate::engine::ReconstructError;
use crate::orchestration::FetchError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("External API error: {0}")]
    ExternalApi(String),
    #[error("Missing quotes: {0}")]
    MissingQuotes(String),
    #[error("Cache error: {0}")]
    Cache(String),
}

impl AppError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded"),
            AppError::ExternalApi(_) => (StatusCode::BAD_GATEWAY, "external_api_error"),
            AppError::MissingQuotes(_) => (StatusCode::BAD_GATEWAY, "missing_quotes"),
            AppError::Cache(_) => (StatusCode::INTERNAL_SERVER_ERROR, "cache_error"),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<LedgerReadError> for AppError {
    fn from(err: LedgerReadError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::Cache(err.to_string())
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::RateLimitExceeded { .. } => AppError::RateLimited(err.to_string()),
            FetchError::ExternalApi { .. } => AppError::ExternalApi(err.to_string()),
            FetchError::Cache(e) => e.into(),
        }
    }
}

impl From<ReconstructError> for AppError {
    fn from(err: ReconstructError) -> Self {
        match err {
            ReconstructError::Validation(e) => e.into(),
            ReconstructError::MissingQuotes { .. } => AppError::MissingQuotes(err.to_string()),
            ReconstructError::Fetch(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(json!({
            "error": kind,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
