pub mod authorize;
pub mod status;
pub mod void;

use axum::http::HeaderMap;

use crate::error::AuthorizationError;
use crate::state::AppState;

const X_API_KEY: &str = "x-api-key";

/// API-key gate. A deployment without a configured key (local runs) skips it.
pub fn require_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), AuthorizationError> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(());
    };
    let presented = headers
        .get(X_API_KEY)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthorizationError::Unauthenticated)?;
    if presented != expected {
        return Err(AuthorizationError::Unauthenticated);
    }
    Ok(())
}
