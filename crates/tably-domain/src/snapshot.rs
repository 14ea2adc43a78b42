//! Read-model view of an authorization request.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::status::AuthStatus;

/// One row of `auth_request_state` as services consume it. The ingress
/// serves it to clients (selectively) and the worker both checks it before
/// processing and signals it to fast-path waiters.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRequestSnapshot {
    pub auth_request_id: Uuid,
    pub restaurant_id: Uuid,
    pub payment_token: String,
    pub status: AuthStatus,
    pub amount_minor: i64,
    pub currency: String,
    pub processor_name: Option<String>,
    pub processor_auth_id: Option<String>,
    pub authorization_code: Option<String>,
    pub authorized_amount_minor: Option<i64>,
    pub denial_code: Option<String>,
    pub denial_reason: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
