use std::collections::BTreeMap;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tably_domain::status::AuthStatus;

use crate::domain::types::AuthRequestSnapshot;
use crate::error::AuthorizationError;
use crate::handlers::require_api_key;
use crate::state::AppState;
use crate::usecase::authorize::{AuthorizeInput, AuthorizeUseCase};

// ── POST /v1/authorize ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AuthorizeRequest {
    pub restaurant_id: Uuid,
    pub payment_token: String,
    pub amount_minor: i64,
    pub currency: String,
    pub idempotency_key: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Serialize)]
pub struct AuthorizationResultBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor_auth_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_amount_minor: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Serialize)]
pub struct AuthorizeResponse {
    pub auth_request_id: Uuid,
    pub status: AuthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AuthorizationResultBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_url: Option<String>,
}

/// Build the client-facing view of a snapshot. Terminal outcomes carry the
/// processor result; in-flight ones carry the polling URL instead.
pub fn response_from_snapshot(snapshot: &AuthRequestSnapshot) -> (StatusCode, AuthorizeResponse) {
    let result = match snapshot.status {
        AuthStatus::Authorized => Some(AuthorizationResultBody {
            processor_name: snapshot.processor_name.clone(),
            processor_auth_id: snapshot.processor_auth_id.clone(),
            authorization_code: snapshot.authorization_code.clone(),
            authorized_amount_minor: snapshot.authorized_amount_minor,
            currency: Some(snapshot.currency.clone()),
            denial_code: None,
            denial_reason: None,
            error_message: None,
        }),
        AuthStatus::Denied => Some(AuthorizationResultBody {
            processor_name: snapshot.processor_name.clone(),
            processor_auth_id: None,
            authorization_code: None,
            authorized_amount_minor: None,
            currency: None,
            denial_code: snapshot.denial_code.clone(),
            denial_reason: snapshot.denial_reason.clone(),
            error_message: None,
        }),
        AuthStatus::Failed => snapshot.error_message.as_ref().map(|message| {
            AuthorizationResultBody {
                processor_name: snapshot.processor_name.clone(),
                processor_auth_id: None,
                authorization_code: None,
                authorized_amount_minor: None,
                currency: None,
                denial_code: None,
                denial_reason: None,
                error_message: Some(message.clone()),
            }
        }),
        _ => None,
    };

    let (http_status, status_url) = if snapshot.status.is_terminal() {
        (StatusCode::OK, None)
    } else {
        (
            StatusCode::ACCEPTED,
            Some(format!(
                "/v1/authorize/{}/status",
                snapshot.auth_request_id
            )),
        )
    };

    (
        http_status,
        AuthorizeResponse {
            auth_request_id: snapshot.auth_request_id,
            status: snapshot.status,
            result,
            status_url,
        },
    )
}

pub async fn post_authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AuthorizeRequest>,
) -> Result<impl IntoResponse, AuthorizationError> {
    require_api_key(&state, &headers)?;

    let usecase = AuthorizeUseCase {
        repo: state.auth_repo(),
        waiters: state.waiters.clone(),
        fast_path_wait: state.fast_path_wait,
        poll_interval: state.fast_path_poll_interval,
    };

    let out = usecase
        .execute(AuthorizeInput {
            restaurant_id: body.restaurant_id,
            payment_token: body.payment_token,
            amount_minor: body.amount_minor,
            currency: body.currency,
            idempotency_key: body.idempotency_key,
            metadata: body.metadata,
        })
        .await?;

    let (status, response) = response_from_snapshot(&out.snapshot);
    Ok((status, Json(response)))
}
