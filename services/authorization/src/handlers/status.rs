use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AuthorizationError;
use crate::handlers::authorize::response_from_snapshot;
use crate::handlers::require_api_key;
use crate::state::AppState;
use crate::usecase::status::GetStatusUseCase;

// ── GET /v1/authorize/{id}/status ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct StatusQuery {
    pub restaurant_id: Uuid,
}

pub async fn get_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auth_request_id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> Result<impl IntoResponse, AuthorizationError> {
    require_api_key(&state, &headers)?;

    let usecase = GetStatusUseCase {
        repo: state.auth_repo(),
    };
    let snapshot = usecase.execute(query.restaurant_id, auth_request_id).await?;

    // Same payload shape as authorize; the status endpoint is the
    // authoritative outcome view after the fast path.
    let (_, response) = response_from_snapshot(&snapshot);
    Ok(Json(response))
}
