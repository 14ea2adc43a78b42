use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use tably_core::error::error_response;

/// Token service error variants mapped to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum TokenServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("unknown or unsupported key id")]
    UnknownKey,
    #[error("failed to decrypt payment data")]
    DecryptionFailed,
    #[error("missing or invalid API key")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("idempotency key reused with a different request")]
    IdempotencyConflict,
    #[error("not found")]
    NotFound,
    #[error("token expired")]
    Expired,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl TokenServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::UnknownKey => "UNKNOWN_KEY",
            Self::DecryptionFailed => "DECRYPTION_FAILED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            Self::NotFound => "NOT_FOUND",
            Self::Expired => "EXPIRED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for TokenServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) | Self::UnknownKey | Self::DecryptionFailed => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::IdempotencyConflict => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Expired => StatusCode::GONE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, self.kind(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_expired_to_410() {
        let resp = TokenServiceError::Expired.into_response();
        assert_eq!(resp.status(), StatusCode::GONE);
    }

    #[test]
    fn should_map_decryption_failure_to_400() {
        let resp = TokenServiceError::DecryptionFailed.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
