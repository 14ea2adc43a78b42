//! Payment token entity and validation rules.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tably_domain::card::{CardMetadata, PaymentData};
use tably_domain::id::PaymentTokenId;

/// A stored token as the service works with it. The ciphertext is the
/// serialized `PaymentData` sealed under `service_key_version`.
#[derive(Debug, Clone)]
pub struct PaymentTokenRecord {
    pub token_id: PaymentTokenId,
    pub restaurant_id: Uuid,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub service_key_version: String,
    pub origin_key_id: String,
    pub metadata: CardMetadata,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PaymentTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Idempotency binding for a prior create with the same (tenant, key).
#[derive(Debug, Clone)]
pub struct TokenBinding {
    pub token_id: PaymentTokenId,
    pub fingerprint: String,
}

/// Audit entry written for every decrypt attempt, including failures.
#[derive(Debug, Clone)]
pub struct DecryptAuditEntry {
    pub token_id: String,
    pub restaurant_id: Uuid,
    pub requesting_service: String,
    pub result: DecryptAuditResult,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptAuditResult {
    Success,
    Denied,
    NotFound,
    Expired,
}

impl DecryptAuditResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Denied => "denied",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
        }
    }
}

/// Sanity checks on decrypted card data before a token is minted. Not a full
/// Luhn validation; processors are authoritative on card validity.
pub fn validate_payment_data(data: &PaymentData) -> Result<(), String> {
    let digits = data.card_number.len();
    if !(12..=19).contains(&digits) || !data.card_number.bytes().all(|b| b.is_ascii_digit()) {
        return Err("card number must be 12-19 digits".to_owned());
    }
    if !(1..=12).contains(&data.exp_month) {
        return Err("expiry month must be 1-12".to_owned());
    }
    if !(2000..=2100).contains(&data.exp_year) {
        return Err("expiry year out of range".to_owned());
    }
    if let Some(cvv) = &data.cvv {
        if !(3..=4).contains(&cvv.len()) || !cvv.bytes().all(|b| b.is_ascii_digit()) {
            return Err("cvv must be 3-4 digits".to_owned());
        }
    }
    Ok(())
}
