//! Authorization processing orchestration.
//!
//! Drives one queue delivery through the full pipeline: lock, state check,
//! start event, token decrypt, processor call, terminal recording. The
//! combination of the lock, the state check, and the per-aggregate sequence
//! compare-and-set keeps the externally visible processor call exactly-once
//! per terminal outcome, no matter how often the queue redelivers.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use tably_core::waiters::WaiterRegistry;
use tably_domain::snapshot::AuthRequestSnapshot;
use tably_domain::status::AuthStatus;

use crate::domain::repository::{LockManager, PaymentStore, TokenDecryptor};
use crate::domain::types::{ProcessingOutcome, TokenDecryptError};
use crate::processors::{Processor, ProcessorError};

pub struct AuthRequestProcessor<S: PaymentStore, L: LockManager, T: TokenDecryptor> {
    pub store: S,
    pub locks: L,
    pub tokens: T,
    pub worker_id: String,
    pub lock_ttl: Duration,
    pub max_retries: u32,
    pub processor_timeout: Duration,
    /// Fast-path registry shared with a same-process ingress; `None` in a
    /// standalone worker deployment.
    pub waiters: Option<Arc<WaiterRegistry<AuthRequestSnapshot>>>,
}

impl<S: PaymentStore, L: LockManager, T: TokenDecryptor> AuthRequestProcessor<S, L, T> {
    /// Process one auth-request delivery. `receive_count` is the queue's
    /// delivery counter and doubles as the retry counter.
    pub async fn process_auth_request(
        &self,
        auth_request_id: Uuid,
        receive_count: u32,
    ) -> Result<ProcessingOutcome, anyhow::Error> {
        if !self
            .locks
            .acquire(auth_request_id, &self.worker_id, self.lock_ttl)
            .await?
        {
            return Ok(ProcessingOutcome::SkippedLockHeld);
        }

        let outcome = self.process_locked(auth_request_id, receive_count).await;

        if let Err(e) = self.locks.release(auth_request_id, &self.worker_id).await {
            error!(auth_request_id = %auth_request_id, error = %e, "lock release failed");
        }
        outcome
    }

    async fn process_locked(
        &self,
        auth_request_id: Uuid,
        receive_count: u32,
    ) -> Result<ProcessingOutcome, anyhow::Error> {
        let Some(snapshot) = self.store.snapshot(auth_request_id).await? else {
            // A queue message without a read-model row means the ingress
            // transaction never committed; nothing to process.
            warn!(auth_request_id = %auth_request_id, "no read model row for queued message");
            return Ok(ProcessingOutcome::Completed);
        };

        if snapshot.status.is_terminal() {
            info!(
                auth_request_id = %auth_request_id,
                status = %snapshot.status,
                "duplicate delivery after terminal state, discarding"
            );
            return Ok(ProcessingOutcome::SkippedAlreadyTerminal);
        }

        // Void race rule: a void recorded before any processor response wins,
        // and the processor is never called.
        if self.store.has_void_requested(auth_request_id).await? {
            info!(auth_request_id = %auth_request_id, "void detected before processing");
            self.store
                .record_expired(auth_request_id, "void_before_auth")
                .await?;
            self.signal_waiters(auth_request_id).await;
            return Ok(ProcessingOutcome::SkippedVoidDetected);
        }

        let Some(restaurant_config) = self
            .store
            .restaurant_config(snapshot.restaurant_id)
            .await?
        else {
            self.store
                .record_failed_terminal(
                    auth_request_id,
                    "CONFIG_NOT_FOUND",
                    "restaurant payment configuration not found",
                )
                .await?;
            self.signal_waiters(auth_request_id).await;
            return Ok(ProcessingOutcome::TerminalFailure);
        };

        self.store
            .record_attempt_started(
                auth_request_id,
                &self.worker_id,
                &restaurant_config.config_version,
            )
            .await?;

        let payment_data = match self
            .tokens
            .decrypt(&snapshot.payment_token, snapshot.restaurant_id, None)
            .await
        {
            Ok(data) => data,
            Err(e) if e.is_retryable() => {
                return self
                    .retryable_failure(auth_request_id, e.error_code(), &e.to_string(), receive_count)
                    .await;
            }
            Err(e) => {
                error!(
                    auth_request_id = %auth_request_id,
                    error_code = e.error_code(),
                    "token decrypt failed terminally"
                );
                self.store
                    .record_failed_terminal(auth_request_id, e.error_code(), &e.to_string())
                    .await?;
                self.signal_waiters(auth_request_id).await;
                return Ok(ProcessingOutcome::TerminalFailure);
            }
        };

        // Buy headroom for the processor call; the TTL was sized for it, but
        // the decrypt hop may already have eaten into it.
        let _ = self
            .locks
            .renew(auth_request_id, &self.worker_id, self.lock_ttl)
            .await;

        let processor = Processor::from_config(
            &restaurant_config.config,
            restaurant_config.statement_descriptor.as_deref(),
            self.processor_timeout,
        );

        match processor
            .authorize(&payment_data, snapshot.amount_minor, &snapshot.currency)
            .await
        {
            Ok(tably_domain::result::AuthorizationResult::Authorized(result)) => {
                info!(
                    auth_request_id = %auth_request_id,
                    processor_name = %result.processor_name,
                    processor_auth_id = %result.processor_auth_id,
                    "authorization approved"
                );
                self.store.record_authorized(auth_request_id, &result).await?;
                self.signal_waiters(auth_request_id).await;
                Ok(ProcessingOutcome::Completed)
            }
            Ok(tably_domain::result::AuthorizationResult::Denied(result)) => {
                info!(
                    auth_request_id = %auth_request_id,
                    denial_code = %result.denial_code,
                    "authorization denied"
                );
                self.store.record_denied(auth_request_id, &result).await?;
                self.signal_waiters(auth_request_id).await;
                Ok(ProcessingOutcome::Completed)
            }
            Err(ProcessorError::Transient(message)) => {
                self.retryable_failure(auth_request_id, "PROCESSOR_TRANSIENT", &message, receive_count)
                    .await
            }
            Err(ProcessorError::Fatal(message)) => {
                error!(auth_request_id = %auth_request_id, error = %message, "processor failed fatally");
                self.store
                    .record_failed_terminal(auth_request_id, "PROCESSOR_FATAL", &message)
                    .await?;
                self.signal_waiters(auth_request_id).await;
                Ok(ProcessingOutcome::TerminalFailure)
            }
        }
    }

    /// Retry rule: record a retryable failure and let the queue's visibility
    /// timeout redeliver, unless retries are exhausted.
    async fn retryable_failure(
        &self,
        auth_request_id: Uuid,
        error_code: &str,
        message: &str,
        receive_count: u32,
    ) -> Result<ProcessingOutcome, anyhow::Error> {
        if receive_count >= self.max_retries {
            warn!(
                auth_request_id = %auth_request_id,
                receive_count,
                max_retries = self.max_retries,
                "retries exhausted, failing terminally"
            );
            self.store
                .record_failed_terminal(
                    auth_request_id,
                    "max_retries_exceeded",
                    &format!("max retries ({}) exceeded: {message}", self.max_retries),
                )
                .await?;
            self.signal_waiters(auth_request_id).await;
            return Ok(ProcessingOutcome::TerminalFailure);
        }

        warn!(
            auth_request_id = %auth_request_id,
            error_code,
            receive_count,
            "retryable failure, leaving message for redelivery"
        );
        self.store
            .record_failed_retryable(auth_request_id, error_code, message, receive_count)
            .await?;
        Ok(ProcessingOutcome::RetryLater)
    }

    /// Process one void-request delivery. Voids before authorization are
    /// folded in by the auth path's state check; this handles
    /// void-after-auth, which does call the processor.
    pub async fn process_void_request(
        &self,
        auth_request_id: Uuid,
        receive_count: u32,
    ) -> Result<ProcessingOutcome, anyhow::Error> {
        if !self
            .locks
            .acquire(auth_request_id, &self.worker_id, self.lock_ttl)
            .await?
        {
            return Ok(ProcessingOutcome::SkippedLockHeld);
        }

        let outcome = self.process_void_locked(auth_request_id, receive_count).await;

        if let Err(e) = self.locks.release(auth_request_id, &self.worker_id).await {
            error!(auth_request_id = %auth_request_id, error = %e, "lock release failed");
        }
        outcome
    }

    async fn process_void_locked(
        &self,
        auth_request_id: Uuid,
        receive_count: u32,
    ) -> Result<ProcessingOutcome, anyhow::Error> {
        let Some(snapshot) = self.store.snapshot(auth_request_id).await? else {
            warn!(auth_request_id = %auth_request_id, "no read model row for void message");
            return Ok(ProcessingOutcome::Completed);
        };

        match snapshot.status {
            // Not yet authorized: the auth worker's void check will expire
            // the request; nothing to undo at the processor.
            AuthStatus::Pending | AuthStatus::Processing => {
                info!(auth_request_id = %auth_request_id, "void ahead of authorization, deferring to state check");
                Ok(ProcessingOutcome::Completed)
            }
            AuthStatus::Voided
            | AuthStatus::Denied
            | AuthStatus::Failed
            | AuthStatus::Expired => Ok(ProcessingOutcome::SkippedAlreadyTerminal),
            AuthStatus::Authorized => {
                let Some(processor_auth_id) = snapshot.processor_auth_id.clone() else {
                    error!(auth_request_id = %auth_request_id, "authorized without processor_auth_id");
                    return Ok(ProcessingOutcome::Completed);
                };
                let Some(restaurant_config) = self
                    .store
                    .restaurant_config(snapshot.restaurant_id)
                    .await?
                else {
                    error!(auth_request_id = %auth_request_id, "restaurant config missing for void");
                    return Ok(ProcessingOutcome::Completed);
                };

                let processor = Processor::from_config(
                    &restaurant_config.config,
                    restaurant_config.statement_descriptor.as_deref(),
                    self.processor_timeout,
                );

                match processor.void(&processor_auth_id, "requested_by_customer").await {
                    Ok(result) => {
                        info!(
                            auth_request_id = %auth_request_id,
                            processor_void_id = %result.processor_void_id,
                            "authorization voided"
                        );
                        self.store
                            .record_void_completed(auth_request_id, &result)
                            .await?;
                        Ok(ProcessingOutcome::Completed)
                    }
                    Err(ProcessorError::Transient(message)) => {
                        if receive_count >= self.max_retries {
                            // Give up; the authorization stays AUTHORIZED and
                            // expires at the processor on its own schedule.
                            error!(
                                auth_request_id = %auth_request_id,
                                error = %message,
                                "void retries exhausted"
                            );
                            return Ok(ProcessingOutcome::TerminalFailure);
                        }
                        warn!(auth_request_id = %auth_request_id, error = %message, "void failed, will retry");
                        Ok(ProcessingOutcome::RetryLater)
                    }
                    Err(ProcessorError::Fatal(message)) => {
                        error!(auth_request_id = %auth_request_id, error = %message, "void failed fatally");
                        Ok(ProcessingOutcome::TerminalFailure)
                    }
                }
            }
        }
    }

    async fn signal_waiters(&self, auth_request_id: Uuid) {
        let Some(waiters) = &self.waiters else {
            return;
        };
        match self.store.snapshot(auth_request_id).await {
            Ok(Some(snapshot)) => {
                let notified = waiters.notify(auth_request_id, snapshot);
                if notified > 0 {
                    info!(auth_request_id = %auth_request_id, notified, "fast-path waiters signaled");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(auth_request_id = %auth_request_id, error = %e, "waiter signal read failed"),
        }
    }
}
