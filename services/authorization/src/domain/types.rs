use std::collections::BTreeMap;

use uuid::Uuid;

pub use tably_domain::snapshot::AuthRequestSnapshot;

/// A validated, not-yet-persisted authorization request.
#[derive(Debug, Clone)]
pub struct NewAuthRequest {
    pub auth_request_id: Uuid,
    pub restaurant_id: Uuid,
    pub payment_token: String,
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
    pub idempotency_key: String,
    pub fingerprint: String,
}

/// Which operation an idempotency key dedupes. Authorize and void keys
/// live in separate spaces: a client reusing one key across both gets two
/// independent bindings instead of a spurious conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyOperation {
    Authorize,
    Void,
}

impl IdempotencyOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authorize => "authorize",
            Self::Void => "void",
        }
    }
}

/// Prior request bound to a (restaurant, idempotency key, operation) triple.
#[derive(Debug, Clone)]
pub struct IdempotencyBinding {
    pub auth_request_id: Uuid,
    pub fingerprint: String,
}

/// What `create` did: inserted a fresh aggregate, or lost a race against a
/// concurrent request with the same idempotency key (the caller re-reads the
/// binding and treats the request as a replay).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    LostIdempotencyRace,
}

/// One pending outbox row as the relay sees it.
#[derive(Debug, Clone)]
pub struct OutboxRow {
    pub id: Uuid,
    pub destination: String,
    pub message_group: Option<String>,
    pub payload: Vec<u8>,
    pub attempts: i32,
}
