#![allow(async_fn_in_trait)]

use uuid::Uuid;

use tably_domain::id::PaymentTokenId;

use crate::domain::encryption::AeadKey;
use crate::domain::token::{DecryptAuditEntry, PaymentTokenRecord, TokenBinding};
use crate::error::TokenServiceError;

/// Repository for stored payment tokens.
pub trait TokenRepository: Send + Sync {
    /// Insert a new token, and its idempotency binding when the client
    /// supplied a key, in one transaction.
    async fn create_with_idempotency(
        &self,
        record: &PaymentTokenRecord,
        idempotency_key: Option<&str>,
        fingerprint: &str,
    ) -> Result<(), TokenServiceError>;

    async fn find(
        &self,
        token_id: &PaymentTokenId,
    ) -> Result<Option<PaymentTokenRecord>, TokenServiceError>;

    /// Look up a prior create binding for (restaurant, idempotency key).
    async fn find_binding(
        &self,
        restaurant_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<TokenBinding>, TokenServiceError>;
}

/// Versioned service-key store.
pub trait KeyStore: Send + Sync {
    /// The key new tokens are sealed under, with its version stamp.
    async fn current_key(&self) -> Result<(String, AeadKey), TokenServiceError>;

    /// Key for a stored token's version; rotation installs new versions
    /// without re-encrypting old tokens.
    async fn key_by_version(&self, version: &str) -> Result<Option<AeadKey>, TokenServiceError>;
}

/// Append-only decrypt audit log.
pub trait DecryptAuditRepository: Send + Sync {
    async fn record(&self, entry: &DecryptAuditEntry) -> Result<(), TokenServiceError>;
}
