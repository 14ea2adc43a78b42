use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tably_domain::status::AuthStatus;

use crate::error::AuthorizationError;
use crate::handlers::require_api_key;
use crate::state::AppState;
use crate::usecase::void::{VoidInput, VoidUseCase};

// ── POST /v1/authorize/{id}/void ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct VoidAuthRequest {
    pub restaurant_id: Uuid,
    pub reason: String,
    pub idempotency_key: String,
}

#[derive(Serialize)]
pub struct VoidAuthResponse {
    pub auth_request_id: Uuid,
    pub status: AuthStatus,
    pub void_requested: bool,
}

pub async fn post_void(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(auth_request_id): Path<Uuid>,
    Json(body): Json<VoidAuthRequest>,
) -> Result<impl IntoResponse, AuthorizationError> {
    require_api_key(&state, &headers)?;

    let usecase = VoidUseCase {
        repo: state.auth_repo(),
    };
    let out = usecase
        .execute(VoidInput {
            restaurant_id: body.restaurant_id,
            auth_request_id,
            reason: body.reason,
            idempotency_key: body.idempotency_key,
        })
        .await?;

    Ok(Json(VoidAuthResponse {
        auth_request_id: out.auth_request_id,
        status: out.status,
        void_requested: true,
    }))
}
