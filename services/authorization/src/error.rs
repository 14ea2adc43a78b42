use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use tably_core::error::error_response;

/// Authorization service error variants mapped to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("{0}")]
    Validation(String),
    #[error("missing or invalid API key")]
    Unauthenticated,
    #[error("idempotency key reused with a different request")]
    IdempotencyConflict,
    #[error("not found")]
    NotFound,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AuthorizationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            Self::NotFound => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for AuthorizationError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::IdempotencyConflict => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, self.kind(), self.to_string())
    }
}
