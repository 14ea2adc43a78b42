use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr,
    TransactionTrait,
};
use tokio::sync::Notify;
use uuid::Uuid;

use tably_payments_schema::{
    auth_idempotency_keys, auth_request_state, outbox_messages, payment_events,
    restaurant_payment_configs,
};

use crate::domain::events::{
    AGGREGATE_TYPE_AUTH_REQUEST, EVENT_AUTH_REQUEST_CREATED, EVENT_AUTH_VOID_REQUESTED,
    auth_request_created, auth_request_queued_message, auth_void_requested,
    void_request_queued_message,
};
use crate::domain::repository::{AuthRequestRepository, OutboxStore};
use crate::domain::types::{
    AuthRequestSnapshot, CreateOutcome, IdempotencyBinding, IdempotencyOperation, NewAuthRequest,
    OutboxRow,
};
use crate::error::AuthorizationError;

const SEQUENCE_CONSTRAINT: &str = "uq_payment_events_aggregate_sequence";
const VOID_RETRY_ATTEMPTS: usize = 3;

// ── Auth request repository ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAuthRequestRepository {
    pub db: DatabaseConnection,
    pub auth_queue: String,
    pub void_queue: String,
    pub idempotency_ttl_hours: u32,
    /// Woken after any commit that inserted an outbox row.
    pub relay_wakeup: Arc<Notify>,
}

impl AuthRequestRepository for DbAuthRequestRepository {
    async fn restaurant_provisioned(
        &self,
        restaurant_id: Uuid,
    ) -> Result<bool, AuthorizationError> {
        let count = restaurant_payment_configs::Entity::find_by_id(restaurant_id)
            .count(&self.db)
            .await
            .context("check restaurant payment config")?;
        Ok(count > 0)
    }

    async fn find_binding(
        &self,
        restaurant_id: Uuid,
        idempotency_key: &str,
        operation: IdempotencyOperation,
    ) -> Result<Option<IdempotencyBinding>, AuthorizationError> {
        let now = Utc::now();
        let model = auth_idempotency_keys::Entity::find()
            .filter(auth_idempotency_keys::Column::RestaurantId.eq(restaurant_id))
            .filter(auth_idempotency_keys::Column::IdempotencyKey.eq(idempotency_key))
            .filter(auth_idempotency_keys::Column::Operation.eq(operation.as_str()))
            .filter(auth_idempotency_keys::Column::ExpiresAt.gt(now))
            .one(&self.db)
            .await
            .context("find idempotency binding")?;
        Ok(model.map(|model| IdempotencyBinding {
            auth_request_id: model.auth_request_id,
            fingerprint: model.fingerprint,
        }))
    }

    async fn create(&self, request: &NewAuthRequest) -> Result<CreateOutcome, AuthorizationError> {
        let request = request.clone();
        let auth_queue = self.auth_queue.clone();
        let ttl = Duration::hours(i64::from(self.idempotency_ttl_hours));

        let result = self
            .db
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();

                    payment_events::ActiveModel {
                        event_id: Set(Uuid::new_v4()),
                        aggregate_id: Set(request.auth_request_id),
                        aggregate_type: Set(AGGREGATE_TYPE_AUTH_REQUEST.to_owned()),
                        event_type: Set(EVENT_AUTH_REQUEST_CREATED.to_owned()),
                        payload: Set(auth_request_created(&request)),
                        sequence_number: Set(1),
                        metadata: Set(Some(serde_json::json!({
                            "idempotency_key": request.idempotency_key,
                        }))),
                        created_at: Set(now),
                    }
                    .insert(txn)
                    .await?;

                    auth_request_state::ActiveModel {
                        auth_request_id: Set(request.auth_request_id),
                        restaurant_id: Set(request.restaurant_id),
                        payment_token: Set(request.payment_token.clone()),
                        amount_minor: Set(request.amount_minor),
                        currency: Set(request.currency.clone()),
                        status: Set("PENDING".to_owned()),
                        latest_sequence: Set(1),
                        processor_name: Set(None),
                        processor_auth_id: Set(None),
                        authorization_code: Set(None),
                        authorized_amount_minor: Set(None),
                        denial_code: Set(None),
                        denial_reason: Set(None),
                        error_message: Set(None),
                        retry_count: Set(0),
                        metadata: Set(Some(serde_json::to_value(&request.metadata).unwrap_or_default())),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await?;

                    insert_outbox_row(
                        txn,
                        &auth_queue,
                        Some(request.auth_request_id.to_string()),
                        auth_request_queued_message(request.auth_request_id, request.restaurant_id),
                    )
                    .await?;

                    auth_idempotency_keys::ActiveModel {
                        restaurant_id: Set(request.restaurant_id),
                        idempotency_key: Set(request.idempotency_key.clone()),
                        operation: Set(IdempotencyOperation::Authorize.as_str().to_owned()),
                        auth_request_id: Set(request.auth_request_id),
                        fingerprint: Set(request.fingerprint.clone()),
                        created_at: Set(now),
                        expires_at: Set(now + ttl),
                    }
                    .insert(txn)
                    .await?;

                    Ok(())
                })
            })
            .await;

        match result {
            Ok(()) => {
                self.relay_wakeup.notify_one();
                Ok(CreateOutcome::Created)
            }
            Err(e) if is_unique_violation(&e) => Ok(CreateOutcome::LostIdempotencyRace),
            Err(e) => Err(anyhow::Error::new(e)
                .context("create authorization request")
                .into()),
        }
    }

    async fn snapshot(
        &self,
        auth_request_id: Uuid,
    ) -> Result<Option<AuthRequestSnapshot>, AuthorizationError> {
        let model = auth_request_state::Entity::find_by_id(auth_request_id)
            .one(&self.db)
            .await
            .context("read auth request state")?;
        model.map(snapshot_from_model).transpose()
    }

    async fn snapshot_for(
        &self,
        restaurant_id: Uuid,
        auth_request_id: Uuid,
    ) -> Result<Option<AuthRequestSnapshot>, AuthorizationError> {
        let model = auth_request_state::Entity::find_by_id(auth_request_id)
            .filter(auth_request_state::Column::RestaurantId.eq(restaurant_id))
            .one(&self.db)
            .await
            .context("read auth request state")?;
        model.map(snapshot_from_model).transpose()
    }

    async fn record_void(
        &self,
        auth_request_id: Uuid,
        restaurant_id: Uuid,
        reason: &str,
        idempotency_key: &str,
        fingerprint: &str,
    ) -> Result<CreateOutcome, AuthorizationError> {
        for _ in 0..VOID_RETRY_ATTEMPTS {
            let void_queue = self.void_queue.clone();
            let reason = reason.to_owned();
            let idempotency_key = idempotency_key.to_owned();
            let fingerprint = fingerprint.to_owned();
            let ttl = Duration::hours(i64::from(self.idempotency_ttl_hours));

            let result = self
                .db
                .transaction::<_, (), DbErr>(move |txn| {
                    Box::pin(async move {
                        let now = Utc::now();
                        let sequence = next_sequence(txn, auth_request_id).await?;

                        payment_events::ActiveModel {
                            event_id: Set(Uuid::new_v4()),
                            aggregate_id: Set(auth_request_id),
                            aggregate_type: Set(AGGREGATE_TYPE_AUTH_REQUEST.to_owned()),
                            event_type: Set(EVENT_AUTH_VOID_REQUESTED.to_owned()),
                            payload: Set(auth_void_requested(auth_request_id, &reason)),
                            sequence_number: Set(sequence),
                            metadata: Set(None),
                            created_at: Set(now),
                        }
                        .insert(txn)
                        .await?;

                        insert_outbox_row(
                            txn,
                            &void_queue,
                            None,
                            void_request_queued_message(auth_request_id, restaurant_id, &reason),
                        )
                        .await?;

                        auth_idempotency_keys::ActiveModel {
                            restaurant_id: Set(restaurant_id),
                            idempotency_key: Set(idempotency_key.clone()),
                            operation: Set(IdempotencyOperation::Void.as_str().to_owned()),
                            auth_request_id: Set(auth_request_id),
                            fingerprint: Set(fingerprint.clone()),
                            created_at: Set(now),
                            expires_at: Set(now + ttl),
                        }
                        .insert(txn)
                        .await?;

                        Ok(())
                    })
                })
                .await;

            match result {
                Ok(()) => {
                    self.relay_wakeup.notify_one();
                    return Ok(CreateOutcome::Created);
                }
                // Sequence collision with a concurrent writer: re-read and retry.
                Err(e) if is_sequence_conflict(&e) => continue,
                Err(e) if is_unique_violation(&e) => {
                    return Ok(CreateOutcome::LostIdempotencyRace);
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e).context("record void request").into());
                }
            }
        }
        Err(AuthorizationError::Internal(anyhow::anyhow!(
            "gave up appending AuthVoidRequested after {VOID_RETRY_ATTEMPTS} sequence conflicts"
        )))
    }
}

async fn insert_outbox_row(
    txn: &DatabaseTransaction,
    destination: &str,
    message_group: Option<String>,
    payload: Vec<u8>,
) -> Result<(), DbErr> {
    let now = Utc::now();
    outbox_messages::ActiveModel {
        id: Set(Uuid::new_v4()),
        destination: Set(destination.to_owned()),
        message_group: Set(message_group),
        payload: Set(payload),
        attempts: Set(0),
        last_error: Set(None),
        created_at: Set(now),
        next_attempt_at: Set(now),
        processed_at: Set(None),
    }
    .insert(txn)
    .await?;
    Ok(())
}

async fn next_sequence(txn: &DatabaseTransaction, aggregate_id: Uuid) -> Result<i64, DbErr> {
    let latest = payment_events::Entity::find()
        .filter(payment_events::Column::AggregateId.eq(aggregate_id))
        .order_by_desc(payment_events::Column::SequenceNumber)
        .limit(1)
        .one(txn)
        .await?;
    Ok(latest.map(|event| event.sequence_number + 1).unwrap_or(1))
}

fn is_unique_violation(error: &sea_orm::TransactionError<DbErr>) -> bool {
    match error {
        sea_orm::TransactionError::Connection(e) | sea_orm::TransactionError::Transaction(e) => {
            matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
        }
    }
}

fn is_sequence_conflict(error: &sea_orm::TransactionError<DbErr>) -> bool {
    match error {
        sea_orm::TransactionError::Connection(e) | sea_orm::TransactionError::Transaction(e) => {
            matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(message))
                if message.contains(SEQUENCE_CONSTRAINT))
        }
    }
}

fn snapshot_from_model(
    model: auth_request_state::Model,
) -> Result<AuthRequestSnapshot, AuthorizationError> {
    Ok(AuthRequestSnapshot {
        auth_request_id: model.auth_request_id,
        restaurant_id: model.restaurant_id,
        payment_token: model.payment_token,
        status: model
            .status
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt status in read model: {e}"))?,
        amount_minor: model.amount_minor,
        currency: model.currency,
        processor_name: model.processor_name,
        processor_auth_id: model.processor_auth_id,
        authorization_code: model.authorization_code,
        authorized_amount_minor: model.authorized_amount_minor,
        denial_code: model.denial_code,
        denial_reason: model.denial_reason,
        error_message: model.error_message,
        retry_count: model.retry_count,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Outbox store (relay side) ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOutboxStore {
    pub db: DatabaseConnection,
}

impl OutboxStore for DbOutboxStore {
    async fn fetch_due(&self, limit: u64) -> Result<Vec<OutboxRow>, AuthorizationError> {
        let now = Utc::now();
        let models = outbox_messages::Entity::find()
            .filter(outbox_messages::Column::ProcessedAt.is_null())
            .filter(outbox_messages::Column::NextAttemptAt.lte(now))
            .order_by_asc(outbox_messages::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .context("fetch due outbox rows")?;
        Ok(models
            .into_iter()
            .map(|model| OutboxRow {
                id: model.id,
                destination: model.destination,
                message_group: model.message_group,
                payload: model.payload,
                attempts: model.attempts,
            })
            .collect())
    }

    async fn mark_processed(&self, id: Uuid) -> Result<(), AuthorizationError> {
        outbox_messages::ActiveModel {
            id: Set(id),
            processed_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("mark outbox row processed")?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), AuthorizationError> {
        let model = outbox_messages::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("load outbox row")?;
        let Some(model) = model else {
            return Ok(());
        };
        outbox_messages::ActiveModel {
            id: Set(id),
            attempts: Set(model.attempts + 1),
            last_error: Set(Some(error.to_owned())),
            next_attempt_at: Set(next_attempt_at),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("mark outbox row failed")?;
        Ok(())
    }
}
