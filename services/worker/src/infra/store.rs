//! Transactional event recording.
//!
//! Every `record_*` appends one event at the aggregate's next sequence
//! number and applies its projection to `auth_request_state` inside one
//! transaction. The unique `(aggregate_id, sequence_number)` index is the
//! compare-and-set: a concurrent writer (e.g. an ingress void append) makes
//! the insert fail and the whole recording retries on a fresh read.

use anyhow::{Context as _, bail};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr,
    TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use tably_domain::processor_config::{ProcessorConfig, RestaurantPaymentConfig};
use tably_domain::result::{AuthorizedResult, DeniedResult, VoidResult};
use tably_domain::snapshot::AuthRequestSnapshot;
use tably_domain::status::AuthStatus;
use tably_payments_schema::{auth_request_state, payment_events, restaurant_payment_configs};

use crate::domain::events;
use crate::domain::repository::PaymentStore;

const APPEND_RETRIES: usize = 3;

const AGGREGATE_TYPE: &str = "auth_request";

#[derive(Clone)]
pub struct DbPaymentStore {
    pub db: DatabaseConnection,
    pub worker_id: String,
}

/// One event append plus its projection, expressed as data so the retry
/// loop can replay it.
#[derive(Clone)]
struct Recording {
    event_type: &'static str,
    payload: Vec<u8>,
    next_status: Option<AuthStatus>,
    apply: Projection,
}

#[derive(Clone)]
enum Projection {
    None,
    Authorized(AuthorizedResult),
    Denied(DeniedResult),
    FailedTerminal { error_code: String, error_message: String },
    FailedRetryable { retry_count: u32, error_message: String },
    Voided,
}

impl DbPaymentStore {
    async fn record(&self, auth_request_id: Uuid, recording: Recording) -> Result<(), anyhow::Error> {
        for _ in 0..APPEND_RETRIES {
            let outcome = self.try_record(auth_request_id, &recording).await;
            match outcome {
                Ok(()) => {
                    info!(
                        auth_request_id = %auth_request_id,
                        event_type = recording.event_type,
                        "event recorded"
                    );
                    return Ok(());
                }
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("record {}", recording.event_type)));
                }
            }
        }
        bail!(
            "gave up recording {} for {auth_request_id} after {APPEND_RETRIES} sequence conflicts",
            recording.event_type
        )
    }

    async fn try_record(
        &self,
        auth_request_id: Uuid,
        recording: &Recording,
    ) -> Result<(), sea_orm::TransactionError<DbErr>> {
        let worker_id = self.worker_id.clone();
        let event_type = recording.event_type;
        let payload = recording.payload.clone();
        let next_status = recording.next_status;
        let projection = recording.apply.clone();

        self.db
            .transaction::<_, (), DbErr>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let sequence = next_sequence(txn, auth_request_id).await?;

                    payment_events::ActiveModel {
                        event_id: Set(Uuid::new_v4()),
                        aggregate_id: Set(auth_request_id),
                        aggregate_type: Set(AGGREGATE_TYPE.to_owned()),
                        event_type: Set(event_type.to_owned()),
                        payload: Set(payload),
                        sequence_number: Set(sequence),
                        metadata: Set(Some(serde_json::json!({ "worker_id": worker_id }))),
                        created_at: Set(now),
                    }
                    .insert(txn)
                    .await?;

                    let current = auth_request_state::Entity::find_by_id(auth_request_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            DbErr::Custom(format!("read model row missing for {auth_request_id}"))
                        })?;

                    let current_status: AuthStatus = current
                        .status
                        .parse()
                        .map_err(|e| DbErr::Custom(format!("corrupt status: {e}")))?;
                    if let Some(next) = next_status {
                        if !current_status.can_transition_to(next) {
                            return Err(DbErr::Custom(format!(
                                "illegal transition {current_status} -> {next} for {auth_request_id}"
                            )));
                        }
                    }

                    let mut update = auth_request_state::ActiveModel {
                        auth_request_id: Set(auth_request_id),
                        latest_sequence: Set(sequence),
                        updated_at: Set(now),
                        ..Default::default()
                    };
                    if let Some(next) = next_status {
                        update.status = Set(next.as_str().to_owned());
                    }
                    match projection {
                        Projection::None => {}
                        Projection::Authorized(result) => {
                            update.processor_name = Set(Some(result.processor_name));
                            update.processor_auth_id = Set(Some(result.processor_auth_id));
                            update.authorization_code = Set(Some(result.authorization_code));
                            update.authorized_amount_minor =
                                Set(Some(result.authorized_amount_minor));
                        }
                        Projection::Denied(result) => {
                            update.processor_name = Set(Some(result.processor_name));
                            update.denial_code = Set(Some(result.denial_code));
                            update.denial_reason = Set(Some(result.denial_reason));
                        }
                        Projection::FailedTerminal {
                            error_code,
                            error_message,
                        } => {
                            update.error_message =
                                Set(Some(format!("{error_code}: {error_message}")));
                        }
                        Projection::FailedRetryable {
                            retry_count,
                            error_message,
                        } => {
                            update.retry_count = Set(retry_count as i32);
                            update.error_message = Set(Some(error_message));
                        }
                        Projection::Voided => {}
                    }
                    update.update(txn).await?;

                    Ok(())
                })
            })
            .await
    }
}

impl PaymentStore for DbPaymentStore {
    async fn snapshot(
        &self,
        auth_request_id: Uuid,
    ) -> Result<Option<AuthRequestSnapshot>, anyhow::Error> {
        let model = auth_request_state::Entity::find_by_id(auth_request_id)
            .one(&self.db)
            .await
            .context("read auth request state")?;
        model.map(snapshot_from_model).transpose()
    }

    async fn has_void_requested(&self, auth_request_id: Uuid) -> Result<bool, anyhow::Error> {
        let count = payment_events::Entity::find()
            .filter(payment_events::Column::AggregateId.eq(auth_request_id))
            .filter(payment_events::Column::EventType.eq("AuthVoidRequested"))
            .count(&self.db)
            .await
            .context("check for void event")?;
        Ok(count > 0)
    }

    async fn restaurant_config(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Option<RestaurantPaymentConfig>, anyhow::Error> {
        let model = restaurant_payment_configs::Entity::find_by_id(restaurant_id)
            .one(&self.db)
            .await
            .context("read restaurant payment config")?;
        match model {
            Some(model) => {
                let config: ProcessorConfig = serde_json::from_value(model.processor_config)
                    .context("parse restaurant processor config")?;
                Ok(Some(RestaurantPaymentConfig {
                    restaurant_id: model.restaurant_id,
                    config,
                    config_version: model.config_version,
                    statement_descriptor: model.statement_descriptor,
                }))
            }
            None => Ok(None),
        }
    }

    async fn record_attempt_started(
        &self,
        auth_request_id: Uuid,
        worker_id: &str,
        config_version: &str,
    ) -> Result<(), anyhow::Error> {
        self.record(
            auth_request_id,
            Recording {
                event_type: events::EVENT_AUTH_ATTEMPT_STARTED,
                payload: events::attempt_started(auth_request_id, worker_id, config_version),
                next_status: Some(AuthStatus::Processing),
                apply: Projection::None,
            },
        )
        .await
    }

    async fn record_authorized(
        &self,
        auth_request_id: Uuid,
        result: &AuthorizedResult,
    ) -> Result<(), anyhow::Error> {
        self.record(
            auth_request_id,
            Recording {
                event_type: events::EVENT_AUTH_RESPONSE_RECEIVED,
                payload: events::response_authorized(auth_request_id, result),
                next_status: Some(AuthStatus::Authorized),
                apply: Projection::Authorized(result.clone()),
            },
        )
        .await
    }

    async fn record_denied(
        &self,
        auth_request_id: Uuid,
        result: &DeniedResult,
    ) -> Result<(), anyhow::Error> {
        self.record(
            auth_request_id,
            Recording {
                event_type: events::EVENT_AUTH_RESPONSE_RECEIVED,
                payload: events::response_denied(auth_request_id, result),
                next_status: Some(AuthStatus::Denied),
                apply: Projection::Denied(result.clone()),
            },
        )
        .await
    }

    async fn record_failed_retryable(
        &self,
        auth_request_id: Uuid,
        error_code: &str,
        error_message: &str,
        retry_count: u32,
    ) -> Result<(), anyhow::Error> {
        self.record(
            auth_request_id,
            Recording {
                event_type: events::EVENT_AUTH_ATTEMPT_FAILED,
                payload: events::attempt_failed(
                    auth_request_id,
                    error_code,
                    error_message,
                    true,
                    retry_count,
                ),
                // Status stays PROCESSING while the queue redelivers.
                next_status: Some(AuthStatus::Processing),
                apply: Projection::FailedRetryable {
                    retry_count,
                    error_message: error_message.to_owned(),
                },
            },
        )
        .await
    }

    async fn record_failed_terminal(
        &self,
        auth_request_id: Uuid,
        error_code: &str,
        error_message: &str,
    ) -> Result<(), anyhow::Error> {
        self.record(
            auth_request_id,
            Recording {
                event_type: events::EVENT_AUTH_ATTEMPT_FAILED,
                payload: events::attempt_failed(
                    auth_request_id,
                    error_code,
                    error_message,
                    false,
                    0,
                ),
                next_status: Some(AuthStatus::Failed),
                apply: Projection::FailedTerminal {
                    error_code: error_code.to_owned(),
                    error_message: error_message.to_owned(),
                },
            },
        )
        .await
    }

    async fn record_expired(
        &self,
        auth_request_id: Uuid,
        reason: &str,
    ) -> Result<(), anyhow::Error> {
        self.record(
            auth_request_id,
            Recording {
                event_type: events::EVENT_AUTH_REQUEST_EXPIRED,
                payload: events::request_expired(auth_request_id, reason),
                next_status: Some(AuthStatus::Expired),
                apply: Projection::None,
            },
        )
        .await
    }

    async fn record_void_completed(
        &self,
        auth_request_id: Uuid,
        result: &VoidResult,
    ) -> Result<(), anyhow::Error> {
        self.record(
            auth_request_id,
            Recording {
                event_type: events::EVENT_AUTH_VOID_COMPLETED,
                payload: events::void_completed(auth_request_id, result),
                next_status: Some(AuthStatus::Voided),
                apply: Projection::Voided,
            },
        )
        .await
    }
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

fn snapshot_from_model(
    model: auth_request_state::Model,
) -> Result<AuthRequestSnapshot, anyhow::Error> {
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
