#![allow(async_fn_in_trait)]

use std::time::Duration;

use uuid::Uuid;

use tably_domain::card::PaymentData;
use tably_domain::processor_config::RestaurantPaymentConfig;
use tably_domain::result::{AuthorizedResult, DeniedResult, VoidResult};
use tably_domain::snapshot::AuthRequestSnapshot;

use crate::domain::types::TokenDecryptError;

/// Tenant-scoped, TTL-bounded advisory lock. Acquisition is atomic: it
/// succeeds iff no row exists or the existing row has expired.
pub trait LockManager: Send + Sync {
    async fn acquire(
        &self,
        auth_request_id: Uuid,
        worker_id: &str,
        ttl: Duration,
    ) -> Result<bool, anyhow::Error>;

    /// Extend a held lock. No-op (Ok(false)) when the caller no longer holds it.
    async fn renew(
        &self,
        auth_request_id: Uuid,
        worker_id: &str,
        ttl: Duration,
    ) -> Result<bool, anyhow::Error>;

    /// Fenced by holder id; releasing a lock taken over by another worker is
    /// a no-op.
    async fn release(&self, auth_request_id: Uuid, worker_id: &str) -> Result<(), anyhow::Error>;

    /// Delete rows whose TTL has passed. Hygiene only: acquisition already
    /// takes over expired rows atomically.
    async fn cleanup_expired(&self) -> Result<u64, anyhow::Error>;
}

/// Event log + read model as the worker mutates them. Every `record_*`
/// appends one event and applies its projection in the same transaction,
/// with the per-aggregate sequence CAS protecting ordering.
pub trait PaymentStore: Send + Sync {
    async fn snapshot(
        &self,
        auth_request_id: Uuid,
    ) -> Result<Option<AuthRequestSnapshot>, anyhow::Error>;

    /// Whether an `AuthVoidRequested` event exists for the aggregate.
    async fn has_void_requested(&self, auth_request_id: Uuid) -> Result<bool, anyhow::Error>;

    async fn restaurant_config(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Option<RestaurantPaymentConfig>, anyhow::Error>;

    async fn record_attempt_started(
        &self,
        auth_request_id: Uuid,
        worker_id: &str,
        config_version: &str,
    ) -> Result<(), anyhow::Error>;

    async fn record_authorized(
        &self,
        auth_request_id: Uuid,
        result: &AuthorizedResult,
    ) -> Result<(), anyhow::Error>;

    async fn record_denied(
        &self,
        auth_request_id: Uuid,
        result: &DeniedResult,
    ) -> Result<(), anyhow::Error>;

    /// Retryable failure: bumps `retry_count`, status stays PROCESSING.
    async fn record_failed_retryable(
        &self,
        auth_request_id: Uuid,
        error_code: &str,
        error_message: &str,
        retry_count: u32,
    ) -> Result<(), anyhow::Error>;

    async fn record_failed_terminal(
        &self,
        auth_request_id: Uuid,
        error_code: &str,
        error_message: &str,
    ) -> Result<(), anyhow::Error>;

    async fn record_expired(
        &self,
        auth_request_id: Uuid,
        reason: &str,
    ) -> Result<(), anyhow::Error>;

    async fn record_void_completed(
        &self,
        auth_request_id: Uuid,
        result: &VoidResult,
    ) -> Result<(), anyhow::Error>;
}

/// Port over the token service's internal decrypt surface.
pub trait TokenDecryptor: Send + Sync {
    async fn decrypt(
        &self,
        payment_token: &str,
        restaurant_id: Uuid,
        correlation_id: Option<&str>,
    ) -> Result<PaymentData, TokenDecryptError>;
}
