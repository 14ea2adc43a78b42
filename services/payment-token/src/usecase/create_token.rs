use chrono::{Duration, Utc};
use uuid::Uuid;

use tably_domain::card::{CardMetadata, PaymentData};
use tably_domain::fingerprint::fingerprint;
use tably_domain::id::PaymentTokenId;

use crate::domain::encryption::{
    AEAD_ALGORITHM, AeadKey, EncryptedData, NONCE_LEN, decrypt_with_key, derive_device_key,
    encrypt_with_key,
};
use crate::domain::repository::{KeyStore, TokenRepository};
use crate::domain::token::{PaymentTokenRecord, validate_payment_data};
use crate::error::TokenServiceError;

/// How the client proved it could encrypt: a device token (hardware-terminal
/// flow, key derived from the BDK) or a named key with explicit metadata
/// (web/partner flow). Exactly one is accepted per request.
#[derive(Debug, Clone)]
pub enum ClientCredential {
    DeviceToken(String),
    EncryptionMetadata {
        key_id: String,
        algorithm: String,
        iv: Vec<u8>,
    },
}

impl ClientCredential {
    /// Stable descriptor recorded on the token row and folded into the
    /// request fingerprint.
    fn origin_key_id(&self) -> String {
        match self {
            Self::DeviceToken(token) => format!("device:{token}"),
            Self::EncryptionMetadata { key_id, .. } => key_id.clone(),
        }
    }
}

/// Resolves client credentials to decryption keys.
///
/// Named keys cover only the development `primary` id here; production
/// deployments resolve partner key ids from a managed secret store.
pub struct ClientKeyResolver {
    pub primary_key: Option<AeadKey>,
    pub base_derivation_key: Option<AeadKey>,
}

impl ClientKeyResolver {
    const DEV_KEY_IDS: [&'static str; 2] = ["primary", "demo-primary-key-001"];

    fn resolve(&self, credential: &ClientCredential) -> Result<AeadKey, TokenServiceError> {
        match credential {
            ClientCredential::DeviceToken(device_token) => {
                let bdk = self.base_derivation_key.as_ref().ok_or_else(|| {
                    TokenServiceError::Internal(anyhow::anyhow!(
                        "device-token flow requires BASE_DERIVATION_KEY"
                    ))
                })?;
                derive_device_key(bdk, device_token)
                    .map_err(|_| TokenServiceError::Validation("invalid device token".into()))
            }
            ClientCredential::EncryptionMetadata { key_id, algorithm, .. } => {
                if algorithm != AEAD_ALGORITHM {
                    return Err(TokenServiceError::Validation(format!(
                        "unsupported algorithm: {algorithm}, only {AEAD_ALGORITHM} is accepted"
                    )));
                }
                if Self::DEV_KEY_IDS.contains(&key_id.as_str()) {
                    self.primary_key
                        .clone()
                        .ok_or(TokenServiceError::UnknownKey)
                } else {
                    Err(TokenServiceError::UnknownKey)
                }
            }
        }
    }
}

pub struct CreateTokenInput {
    pub restaurant_id: Uuid,
    pub encrypted_payment_data: Vec<u8>,
    pub credential: ClientCredential,
    pub idempotency_key: Option<String>,
    /// Client-supplied metadata overrides (brand/last4 hints from the POS).
    pub client_metadata: Option<CardMetadata>,
}

#[derive(Debug)]
pub struct CreateTokenOutput {
    pub token_id: PaymentTokenId,
    pub metadata: CardMetadata,
    pub expires_at: chrono::DateTime<Utc>,
    /// True when an idempotent replay returned an existing token.
    pub replayed: bool,
}

pub struct CreateTokenUseCase<T: TokenRepository, K: KeyStore> {
    pub tokens: T,
    pub keys: K,
    pub resolver: ClientKeyResolver,
    pub token_ttl_hours: u32,
}

impl<T: TokenRepository, K: KeyStore> CreateTokenUseCase<T, K> {
    pub async fn execute(
        &self,
        input: CreateTokenInput,
    ) -> Result<CreateTokenOutput, TokenServiceError> {
        if input.encrypted_payment_data.is_empty() {
            return Err(TokenServiceError::Validation(
                "encrypted_payment_data must not be empty".into(),
            ));
        }

        let request_fingerprint = fingerprint(&[
            &input.restaurant_id.to_string(),
            &hex::encode(&input.encrypted_payment_data),
            &input.credential.origin_key_id(),
        ]);

        if let Some(key) = &input.idempotency_key {
            if let Some(binding) = self.tokens.find_binding(input.restaurant_id, key).await? {
                if binding.fingerprint != request_fingerprint {
                    return Err(TokenServiceError::IdempotencyConflict);
                }
                let existing = self
                    .tokens
                    .find(&binding.token_id)
                    .await?
                    .ok_or_else(|| {
                        TokenServiceError::Internal(anyhow::anyhow!(
                            "idempotency binding points at missing token {}",
                            binding.token_id
                        ))
                    })?;
                tracing::info!(token_id = %existing.token_id, "idempotent token create replayed");
                return Ok(CreateTokenOutput {
                    token_id: existing.token_id,
                    metadata: existing.metadata,
                    expires_at: existing.expires_at,
                    replayed: true,
                });
            }
        }

        let client_key = self.resolver.resolve(&input.credential)?;
        let encrypted = split_client_envelope(&input.credential, &input.encrypted_payment_data)?;
        let plaintext = decrypt_with_key(&client_key, &encrypted)
            .map_err(|_| TokenServiceError::DecryptionFailed)?;

        let payment_data = PaymentData::from_bytes(&plaintext)
            .map_err(|_| TokenServiceError::Validation("malformed payment data".into()))?;
        validate_payment_data(&payment_data).map_err(TokenServiceError::Validation)?;

        let extracted = CardMetadata::from_payment_data(&payment_data);
        let metadata = match input.client_metadata {
            Some(client) => CardMetadata {
                card_brand: pick(client.card_brand, extracted.card_brand),
                last4: pick(client.last4, extracted.last4),
                exp_month: if client.exp_month > 0 {
                    client.exp_month
                } else {
                    extracted.exp_month
                },
                exp_year: if client.exp_year > 0 {
                    client.exp_year
                } else {
                    extracted.exp_year
                },
            },
            None => extracted,
        };

        let (key_version, service_key) = self.keys.current_key().await?;
        let sealed = encrypt_with_key(&service_key, &plaintext)
            .map_err(|e| TokenServiceError::Internal(anyhow::anyhow!(e)))?;

        let now = Utc::now();
        let record = PaymentTokenRecord {
            token_id: PaymentTokenId::generate(),
            restaurant_id: input.restaurant_id,
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce.to_vec(),
            service_key_version: key_version,
            origin_key_id: input.credential.origin_key_id(),
            metadata: metadata.clone(),
            created_at: now,
            expires_at: now + Duration::hours(i64::from(self.token_ttl_hours)),
        };

        self.tokens
            .create_with_idempotency(
                &record,
                input.idempotency_key.as_deref(),
                &request_fingerprint,
            )
            .await?;

        tracing::info!(
            token_id = %record.token_id,
            restaurant_id = %record.restaurant_id,
            key_version = %record.service_key_version,
            "payment token created"
        );

        Ok(CreateTokenOutput {
            token_id: record.token_id,
            metadata,
            expires_at: record.expires_at,
            replayed: false,
        })
    }
}

fn pick(client: String, extracted: String) -> String {
    if client.is_empty() { extracted } else { client }
}

/// Assemble the client envelope. Device payloads carry the 12-byte nonce
/// prepended to the ciphertext; the named-key flow passes the IV separately
/// in its metadata.
fn split_client_envelope(
    credential: &ClientCredential,
    payload: &[u8],
) -> Result<EncryptedData, TokenServiceError> {
    match credential {
        ClientCredential::DeviceToken(_) => {
            if payload.len() <= NONCE_LEN {
                return Err(TokenServiceError::Validation(
                    "device payload too short".into(),
                ));
            }
            let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
            EncryptedData::from_parts(ciphertext.to_vec(), nonce)
                .map_err(|_| TokenServiceError::Validation("invalid device payload".into()))
        }
        ClientCredential::EncryptionMetadata { iv, .. } => {
            EncryptedData::from_parts(payload.to_vec(), iv)
                .map_err(|_| TokenServiceError::Validation("iv must be 12 bytes".into()))
        }
    }
}
