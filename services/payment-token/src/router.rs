use axum::{
    Router,
    routing::{get, post},
};

use tably_core::health::{healthz, readyz};
use tably_core::middleware::request_id_layer;

use crate::handlers::tokens::{create_payment_token, get_payment_token};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Tokens
        .route("/v1/payment-tokens", post(create_payment_token))
        .route("/v1/payment-tokens/{token_id}", get(get_payment_token))
        .layer(request_id_layer())
        .with_state(state)
}
