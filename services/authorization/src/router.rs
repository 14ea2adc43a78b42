use axum::{
    Router,
    routing::{get, post},
};

use tably_core::health::{healthz, readyz};
use tably_core::middleware::request_id_layer;

use crate::handlers::{authorize::post_authorize, status::get_status, void::post_void};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Authorization
        .route("/v1/authorize", post(post_authorize))
        .route("/v1/authorize/{auth_request_id}/status", get(get_status))
        .route("/v1/authorize/{auth_request_id}/void", post(post_void))
        .layer(request_id_layer())
        .with_state(state)
}
