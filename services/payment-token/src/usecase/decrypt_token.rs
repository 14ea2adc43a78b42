use chrono::Utc;
use uuid::Uuid;

use tably_domain::card::PaymentData;
use tably_domain::id::PaymentTokenId;

use crate::domain::encryption::{EncryptedData, decrypt_with_key};
use crate::domain::repository::{DecryptAuditRepository, KeyStore, TokenRepository};
use crate::domain::token::{DecryptAuditEntry, DecryptAuditResult};
use crate::error::TokenServiceError;

pub struct DecryptTokenInput {
    pub token_id: PaymentTokenId,
    pub restaurant_id: Uuid,
    pub requesting_service: String,
    pub correlation_id: Option<String>,
}

pub struct DecryptTokenUseCase<T: TokenRepository, K: KeyStore, A: DecryptAuditRepository> {
    pub tokens: T,
    pub keys: K,
    pub audit: A,
    /// Service names permitted to receive plaintext card data.
    pub allowed_services: Vec<String>,
}

impl<T: TokenRepository, K: KeyStore, A: DecryptAuditRepository> DecryptTokenUseCase<T, K, A> {
    /// Release plaintext card data to an authorized internal caller.
    ///
    /// Every attempt writes an audit row, including denials and misses. The
    /// caller's transport-level identity is checked before this runs; here we
    /// enforce the allow-list, tenant ownership, and token expiry.
    pub async fn execute(
        &self,
        input: DecryptTokenInput,
    ) -> Result<PaymentData, TokenServiceError> {
        let (result, outcome) = self.attempt(&input).await;

        self.audit
            .record(&DecryptAuditEntry {
                token_id: input.token_id.to_string(),
                restaurant_id: input.restaurant_id,
                requesting_service: input.requesting_service.clone(),
                result: outcome,
                correlation_id: input.correlation_id.clone(),
            })
            .await?;

        tracing::info!(
            token_id = %input.token_id,
            restaurant_id = %input.restaurant_id,
            requesting_service = %input.requesting_service,
            result = outcome.as_str(),
            "decrypt attempt audited"
        );

        result
    }

    async fn attempt(
        &self,
        input: &DecryptTokenInput,
    ) -> (Result<PaymentData, TokenServiceError>, DecryptAuditResult) {
        if !self.allowed_services.contains(&input.requesting_service) {
            return (Err(TokenServiceError::Forbidden), DecryptAuditResult::Denied);
        }

        let record = match self.tokens.find(&input.token_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return (
                    Err(TokenServiceError::NotFound),
                    DecryptAuditResult::NotFound,
                );
            }
            Err(e) => return (Err(e), DecryptAuditResult::Denied),
        };

        if record.restaurant_id != input.restaurant_id {
            return (Err(TokenServiceError::Forbidden), DecryptAuditResult::Denied);
        }

        if record.is_expired(Utc::now()) {
            return (Err(TokenServiceError::Expired), DecryptAuditResult::Expired);
        }

        let key = match self.keys.key_by_version(&record.service_key_version).await {
            Ok(Some(key)) => key,
            Ok(None) => {
                return (
                    Err(TokenServiceError::Internal(anyhow::anyhow!(
                        "missing service key version {}",
                        record.service_key_version
                    ))),
                    DecryptAuditResult::Denied,
                );
            }
            Err(e) => return (Err(e), DecryptAuditResult::Denied),
        };

        let encrypted = match EncryptedData::from_parts(record.ciphertext.clone(), &record.nonce) {
            Ok(encrypted) => encrypted,
            Err(_) => {
                return (
                    Err(TokenServiceError::Internal(anyhow::anyhow!(
                        "stored nonce has invalid length"
                    ))),
                    DecryptAuditResult::Denied,
                );
            }
        };

        let plaintext = match decrypt_with_key(&key, &encrypted) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                return (
                    Err(TokenServiceError::Internal(anyhow::anyhow!(
                        "stored ciphertext failed authentication"
                    ))),
                    DecryptAuditResult::Denied,
                );
            }
        };

        match PaymentData::from_bytes(&plaintext) {
            Ok(data) => (Ok(data), DecryptAuditResult::Success),
            Err(_) => (
                Err(TokenServiceError::Internal(anyhow::anyhow!(
                    "stored payment data is malformed"
                ))),
                DecryptAuditResult::Denied,
            ),
        }
    }
}
