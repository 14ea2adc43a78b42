use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tably_domain::card::CardMetadata;
use tably_domain::id::PaymentTokenId;

use crate::error::TokenServiceError;
use crate::state::AppState;
use crate::usecase::create_token::{ClientCredential, CreateTokenInput, CreateTokenUseCase};
use crate::usecase::get_token::GetTokenUseCase;

const X_API_KEY: &str = "x-api-key";

fn require_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), TokenServiceError> {
    let presented = headers
        .get(X_API_KEY)
        .and_then(|v| v.to_str().ok())
        .ok_or(TokenServiceError::Unauthenticated)?;
    if presented != state.api_key.as_str() {
        return Err(TokenServiceError::Unauthenticated);
    }
    Ok(())
}

// ── POST /v1/payment-tokens ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct EncryptionMetadataBody {
    pub key_id: String,
    pub algorithm: String,
    pub iv_b64: String,
}

#[derive(Deserialize)]
pub struct CreatePaymentTokenRequest {
    pub restaurant_id: Uuid,
    /// Base64 of the client ciphertext. Device payloads prepend the nonce.
    pub encrypted_payment_data: String,
    pub device_token: Option<String>,
    pub encryption_metadata: Option<EncryptionMetadataBody>,
    pub idempotency_key: Option<String>,
    pub client_metadata: Option<CardMetadata>,
}

#[derive(Serialize)]
pub struct CreatePaymentTokenResponse {
    pub payment_token: String,
    pub card_brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
    pub expires_at: i64,
}

pub async fn create_payment_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatePaymentTokenRequest>,
) -> Result<impl IntoResponse, TokenServiceError> {
    require_api_key(&state, &headers)?;

    let encrypted_payment_data = BASE64
        .decode(&body.encrypted_payment_data)
        .map_err(|_| TokenServiceError::Validation("encrypted_payment_data must be base64".into()))?;

    // Exactly one credential: either a device token or explicit key metadata.
    let credential = match (body.device_token, body.encryption_metadata) {
        (Some(device_token), None) => ClientCredential::DeviceToken(device_token),
        (None, Some(metadata)) => {
            let iv = BASE64
                .decode(&metadata.iv_b64)
                .map_err(|_| TokenServiceError::Validation("iv_b64 must be base64".into()))?;
            ClientCredential::EncryptionMetadata {
                key_id: metadata.key_id,
                algorithm: metadata.algorithm,
                iv,
            }
        }
        _ => {
            return Err(TokenServiceError::Validation(
                "exactly one of device_token or encryption_metadata is required".into(),
            ));
        }
    };

    let usecase = CreateTokenUseCase {
        tokens: state.token_repo(),
        keys: state.key_store(),
        resolver: state.key_resolver(),
        token_ttl_hours: state.token_ttl_hours,
    };

    let out = usecase
        .execute(CreateTokenInput {
            restaurant_id: body.restaurant_id,
            encrypted_payment_data,
            credential,
            idempotency_key: body.idempotency_key,
            client_metadata: body.client_metadata,
        })
        .await?;

    let status = if out.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let response = CreatePaymentTokenResponse {
        payment_token: out.token_id.to_string(),
        card_brand: out.metadata.card_brand,
        last4: out.metadata.last4,
        exp_month: out.metadata.exp_month,
        exp_year: out.metadata.exp_year,
        expires_at: out.expires_at.timestamp(),
    };
    Ok((status, Json(response)))
}

// ── GET /v1/payment-tokens/{id} ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct GetTokenQuery {
    pub restaurant_id: Uuid,
}

#[derive(Serialize)]
pub struct GetPaymentTokenResponse {
    pub payment_token: String,
    pub card_brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
    pub created_at: i64,
    pub expires_at: i64,
}

pub async fn get_payment_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token_id): Path<String>,
    Query(query): Query<GetTokenQuery>,
) -> Result<impl IntoResponse, TokenServiceError> {
    require_api_key(&state, &headers)?;

    let token_id: PaymentTokenId = token_id.parse().map_err(|_| TokenServiceError::NotFound)?;

    let usecase = GetTokenUseCase {
        tokens: state.token_repo(),
    };
    let out = usecase.execute(&token_id, query.restaurant_id).await?;

    Ok(Json(GetPaymentTokenResponse {
        payment_token: out.token_id.to_string(),
        card_brand: out.metadata.card_brand,
        last4: out.metadata.last4,
        exp_month: out.metadata.exp_month,
        exp_year: out.metadata.exp_year,
        created_at: out.created_at.timestamp(),
        expires_at: out.expires_at.timestamp(),
    }))
}
