// Shared mocks and fixtures for the token service test suite.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use uuid::Uuid;

use tably_domain::id::PaymentTokenId;
use tably_payment_token::domain::encryption::{AeadKey, encrypt_with_key};
use tably_payment_token::domain::repository::{DecryptAuditRepository, KeyStore, TokenRepository};
use tably_payment_token::domain::token::{DecryptAuditEntry, PaymentTokenRecord, TokenBinding};
use tably_payment_token::error::TokenServiceError;
use tably_testing::cards::test_card;

pub const SERVICE_KEY_VERSION: &str = "v1";

// ── Mock token repository ────────────────────────────────────────────────────

#[derive(Default)]
pub struct TokenRepoState {
    pub tokens: HashMap<String, PaymentTokenRecord>,
    pub bindings: HashMap<(Uuid, String), TokenBinding>,
}

#[derive(Clone, Default)]
pub struct MockTokenRepo {
    pub state: Arc<Mutex<TokenRepoState>>,
}

impl MockTokenRepo {
    pub fn token_count(&self) -> usize {
        self.state.lock().unwrap().tokens.len()
    }

    pub fn insert(&self, record: PaymentTokenRecord) {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(record.token_id.as_str().to_owned(), record);
    }
}

impl TokenRepository for MockTokenRepo {
    async fn create_with_idempotency(
        &self,
        record: &PaymentTokenRecord,
        idempotency_key: Option<&str>,
        fingerprint: &str,
    ) -> Result<(), TokenServiceError> {
        let mut state = self.state.lock().unwrap();
        state
            .tokens
            .insert(record.token_id.as_str().to_owned(), record.clone());
        if let Some(key) = idempotency_key {
            state.bindings.insert(
                (record.restaurant_id, key.to_owned()),
                TokenBinding {
                    token_id: record.token_id.clone(),
                    fingerprint: fingerprint.to_owned(),
                },
            );
        }
        Ok(())
    }

    async fn find(
        &self,
        token_id: &PaymentTokenId,
    ) -> Result<Option<PaymentTokenRecord>, TokenServiceError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tokens
            .get(token_id.as_str())
            .cloned())
    }

    async fn find_binding(
        &self,
        restaurant_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<TokenBinding>, TokenServiceError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .bindings
            .get(&(restaurant_id, idempotency_key.to_owned()))
            .cloned())
    }
}

// ── Mock key store ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockKeyStore {
    pub keys: Arc<HashMap<String, AeadKey>>,
    pub current: String,
}

impl MockKeyStore {
    pub fn single(version: &str, key: AeadKey) -> Self {
        let mut keys = HashMap::new();
        keys.insert(version.to_owned(), key);
        Self {
            keys: Arc::new(keys),
            current: version.to_owned(),
        }
    }
}

impl KeyStore for MockKeyStore {
    async fn current_key(&self) -> Result<(String, AeadKey), TokenServiceError> {
        Ok((
            self.current.clone(),
            self.keys.get(&self.current).cloned().unwrap(),
        ))
    }

    async fn key_by_version(&self, version: &str) -> Result<Option<AeadKey>, TokenServiceError> {
        Ok(self.keys.get(version).cloned())
    }
}

// ── Mock audit log ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockAudit {
    pub entries: Arc<Mutex<Vec<DecryptAuditEntry>>>,
}

impl MockAudit {
    pub fn results(&self) -> Vec<&'static str> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.result.as_str())
            .collect()
    }
}

impl DecryptAuditRepository for MockAudit {
    async fn record(&self, entry: &DecryptAuditEntry) -> Result<(), TokenServiceError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// A token record sealed under `service_key`, expiring in 24h.
pub fn stored_token(
    restaurant_id: Uuid,
    service_key: &AeadKey,
    pan: &str,
) -> PaymentTokenRecord {
    let card = test_card(pan);
    let sealed = encrypt_with_key(service_key, &card.to_bytes().unwrap()).unwrap();
    let now = Utc::now();
    PaymentTokenRecord {
        token_id: PaymentTokenId::generate(),
        restaurant_id,
        ciphertext: sealed.ciphertext,
        nonce: sealed.nonce.to_vec(),
        service_key_version: SERVICE_KEY_VERSION.to_owned(),
        origin_key_id: "primary".to_owned(),
        metadata: tably_domain::card::CardMetadata::from_payment_data(&card),
        created_at: now,
        expires_at: now + Duration::hours(24),
    }
}
