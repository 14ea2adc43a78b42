use anyhow::Context as _;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, TransactionTrait,
};
use uuid::Uuid;

use tably_domain::card::CardMetadata;
use tably_domain::id::PaymentTokenId;
use tably_token_schema::{decrypt_audit_log, encryption_keys, payment_tokens, token_idempotency_keys};

use crate::domain::encryption::AeadKey;
use crate::domain::repository::{DecryptAuditRepository, KeyStore, TokenRepository};
use crate::domain::token::{DecryptAuditEntry, PaymentTokenRecord, TokenBinding};
use crate::error::TokenServiceError;

// ── Token repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbTokenRepository {
    pub db: DatabaseConnection,
}

impl TokenRepository for DbTokenRepository {
    async fn create_with_idempotency(
        &self,
        record: &PaymentTokenRecord,
        idempotency_key: Option<&str>,
        fingerprint: &str,
    ) -> Result<(), TokenServiceError> {
        let record = record.clone();
        let idempotency_key = idempotency_key.map(str::to_owned);
        let fingerprint = fingerprint.to_owned();
        self.db
            .transaction::<_, (), sea_orm::DbErr>(move |txn| {
                Box::pin(async move {
                    insert_token(txn, &record).await?;
                    if let Some(key) = idempotency_key {
                        insert_binding(txn, &record, &key, &fingerprint).await?;
                    }
                    Ok(())
                })
            })
            .await
            .context("create payment token")?;
        Ok(())
    }

    async fn find(
        &self,
        token_id: &PaymentTokenId,
    ) -> Result<Option<PaymentTokenRecord>, TokenServiceError> {
        let model = payment_tokens::Entity::find_by_id(token_id.as_str().to_owned())
            .one(&self.db)
            .await
            .context("find payment token")?;
        model.map(record_from_model).transpose()
    }

    async fn find_binding(
        &self,
        restaurant_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<TokenBinding>, TokenServiceError> {
        let now = Utc::now();
        let model = token_idempotency_keys::Entity::find()
            .filter(token_idempotency_keys::Column::RestaurantId.eq(restaurant_id))
            .filter(token_idempotency_keys::Column::IdempotencyKey.eq(idempotency_key))
            .filter(token_idempotency_keys::Column::ExpiresAt.gt(now))
            .one(&self.db)
            .await
            .context("find token idempotency binding")?;
        match model {
            Some(model) => Ok(Some(TokenBinding {
                token_id: model
                    .token_id
                    .parse()
                    .map_err(|_| anyhow::anyhow!("malformed token id in binding"))?,
                fingerprint: model.fingerprint,
            })),
            None => Ok(None),
        }
    }
}

async fn insert_token(
    txn: &DatabaseTransaction,
    record: &PaymentTokenRecord,
) -> Result<(), sea_orm::DbErr> {
    payment_tokens::ActiveModel {
        token_id: Set(record.token_id.as_str().to_owned()),
        restaurant_id: Set(record.restaurant_id),
        ciphertext: Set(record.ciphertext.clone()),
        nonce: Set(record.nonce.clone()),
        service_key_version: Set(record.service_key_version.clone()),
        origin_key_id: Set(record.origin_key_id.clone()),
        card_brand: Set(record.metadata.card_brand.clone()),
        last4: Set(record.metadata.last4.clone()),
        exp_month: Set(record.metadata.exp_month as i32),
        exp_year: Set(record.metadata.exp_year as i32),
        created_at: Set(record.created_at),
        expires_at: Set(record.expires_at),
    }
    .insert(txn)
    .await?;
    Ok(())
}

async fn insert_binding(
    txn: &DatabaseTransaction,
    record: &PaymentTokenRecord,
    idempotency_key: &str,
    fingerprint: &str,
) -> Result<(), sea_orm::DbErr> {
    token_idempotency_keys::ActiveModel {
        restaurant_id: Set(record.restaurant_id),
        idempotency_key: Set(idempotency_key.to_owned()),
        token_id: Set(record.token_id.as_str().to_owned()),
        fingerprint: Set(fingerprint.to_owned()),
        created_at: Set(record.created_at),
        expires_at: Set(record.expires_at),
    }
    .insert(txn)
    .await?;
    Ok(())
}

fn record_from_model(
    model: payment_tokens::Model,
) -> Result<PaymentTokenRecord, TokenServiceError> {
    Ok(PaymentTokenRecord {
        token_id: model
            .token_id
            .parse()
            .map_err(|_| anyhow::anyhow!("malformed token id in storage"))?,
        restaurant_id: model.restaurant_id,
        ciphertext: model.ciphertext,
        nonce: model.nonce,
        service_key_version: model.service_key_version,
        origin_key_id: model.origin_key_id,
        metadata: CardMetadata {
            card_brand: model.card_brand,
            last4: model.last4,
            exp_month: model.exp_month as u32,
            exp_year: model.exp_year as u32,
        },
        created_at: model.created_at,
        expires_at: model.expires_at,
    })
}

// ── Key store ─────────────────────────────────────────────────────────────────

/// Service keys from the `encryption_keys` table. Material is hex in
/// development; KMS-wrapped material is unwrapped upstream of this table in
/// managed deployments.
#[derive(Clone)]
pub struct DbKeyStore {
    pub db: DatabaseConnection,
    pub current_version: String,
}

impl KeyStore for DbKeyStore {
    async fn current_key(&self) -> Result<(String, AeadKey), TokenServiceError> {
        let key = self
            .key_by_version(&self.current_version)
            .await?
            .ok_or_else(|| {
                TokenServiceError::Internal(anyhow::anyhow!(
                    "configured CURRENT_KEY_VERSION {} is not installed",
                    self.current_version
                ))
            })?;
        Ok((self.current_version.clone(), key))
    }

    async fn key_by_version(&self, version: &str) -> Result<Option<AeadKey>, TokenServiceError> {
        let model = encryption_keys::Entity::find_by_id(version.to_owned())
            .one(&self.db)
            .await
            .context("find encryption key")?;
        match model {
            Some(model) => {
                let key = AeadKey::from_hex(&model.key_material)
                    .map_err(|_| anyhow::anyhow!("invalid key material for version {version}"))?;
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }
}

// ── Decrypt audit log ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbDecryptAuditRepository {
    pub db: DatabaseConnection,
}

impl DecryptAuditRepository for DbDecryptAuditRepository {
    async fn record(&self, entry: &DecryptAuditEntry) -> Result<(), TokenServiceError> {
        decrypt_audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            token_id: Set(entry.token_id.clone()),
            restaurant_id: Set(entry.restaurant_id),
            requesting_service: Set(entry.requesting_service.clone()),
            result: Set(entry.result.as_str().to_owned()),
            correlation_id: Set(entry.correlation_id.clone()),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await
        .context("record decrypt audit entry")?;
        Ok(())
    }
}
