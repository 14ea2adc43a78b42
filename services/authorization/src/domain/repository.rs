#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{
    AuthRequestSnapshot, CreateOutcome, IdempotencyBinding, IdempotencyOperation, NewAuthRequest,
    OutboxRow,
};
use crate::error::AuthorizationError;

/// Repository over the payments database as the ingress needs it.
pub trait AuthRequestRepository: Send + Sync {
    /// Whether the restaurant has a payment config and may authorize.
    async fn restaurant_provisioned(&self, restaurant_id: Uuid)
    -> Result<bool, AuthorizationError>;

    async fn find_binding(
        &self,
        restaurant_id: Uuid,
        idempotency_key: &str,
        operation: IdempotencyOperation,
    ) -> Result<Option<IdempotencyBinding>, AuthorizationError>;

    /// Persist a fresh request in one transaction: `AuthRequestCreated`
    /// event at sequence 1, PENDING read-model row, outbox row for the auth
    /// queue, and the idempotency binding.
    async fn create(&self, request: &NewAuthRequest) -> Result<CreateOutcome, AuthorizationError>;

    async fn snapshot(
        &self,
        auth_request_id: Uuid,
    ) -> Result<Option<AuthRequestSnapshot>, AuthorizationError>;

    /// Tenant-scoped snapshot; `None` whether the id is unknown or owned by
    /// another restaurant, so callers cannot enumerate foreign ids.
    async fn snapshot_for(
        &self,
        restaurant_id: Uuid,
        auth_request_id: Uuid,
    ) -> Result<Option<AuthRequestSnapshot>, AuthorizationError>;

    /// Append `AuthVoidRequested` and its outbox row, and bind the void's
    /// idempotency key, in one transaction. The read model is untouched; the
    /// worker folds the void into the state machine.
    async fn record_void(
        &self,
        auth_request_id: Uuid,
        restaurant_id: Uuid,
        reason: &str,
        idempotency_key: &str,
        fingerprint: &str,
    ) -> Result<CreateOutcome, AuthorizationError>;
}

/// Outbox access for the relay.
pub trait OutboxStore: Send + Sync {
    /// Unprocessed rows due for delivery, oldest first.
    async fn fetch_due(&self, limit: u64) -> Result<Vec<OutboxRow>, AuthorizationError>;

    async fn mark_processed(&self, id: Uuid) -> Result<(), AuthorizationError>;

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), AuthorizationError>;
}
