use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use tably_core::waiters::WaiterRegistry;
use tably_domain::currency;
use tably_domain::fingerprint::fingerprint;

use crate::domain::repository::AuthRequestRepository;
use crate::domain::types::{
    AuthRequestSnapshot, CreateOutcome, IdempotencyOperation, NewAuthRequest,
};
use crate::error::AuthorizationError;

pub struct AuthorizeInput {
    pub restaurant_id: Uuid,
    pub payment_token: String,
    pub amount_minor: i64,
    pub currency: String,
    pub idempotency_key: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct AuthorizeOutput {
    pub snapshot: AuthRequestSnapshot,
    /// True when the idempotency binding resolved to an existing request.
    pub replayed: bool,
}

pub struct AuthorizeUseCase<R: AuthRequestRepository> {
    pub repo: R,
    pub waiters: Arc<WaiterRegistry<AuthRequestSnapshot>>,
    /// Bound on the synchronous fast-path wait (W).
    pub fast_path_wait: Duration,
    /// Read-model poll cadence while waiting; covers workers in other
    /// processes, which cannot signal our waiter registry.
    pub poll_interval: Duration,
}

impl<R: AuthRequestRepository> AuthorizeUseCase<R> {
    pub async fn execute(
        &self,
        input: AuthorizeInput,
    ) -> Result<AuthorizeOutput, AuthorizationError> {
        validate(&input)?;

        if !self.repo.restaurant_provisioned(input.restaurant_id).await? {
            return Err(AuthorizationError::Validation(
                "restaurant is not provisioned for payments".into(),
            ));
        }

        let request_fingerprint = fingerprint(&[
            &input.restaurant_id.to_string(),
            &input.payment_token,
            &input.amount_minor.to_string(),
            &input.currency,
        ]);

        if let Some(output) = self
            .try_replay(&input, &request_fingerprint)
            .await?
        {
            return Ok(output);
        }

        let request = NewAuthRequest {
            auth_request_id: Uuid::new_v4(),
            restaurant_id: input.restaurant_id,
            payment_token: input.payment_token.clone(),
            amount_minor: input.amount_minor,
            currency: input.currency.clone(),
            metadata: input.metadata.clone(),
            idempotency_key: input.idempotency_key.clone(),
            fingerprint: request_fingerprint.clone(),
        };

        // Register before the transaction commits so an in-process worker
        // cannot finish between commit and registration.
        let mut waiter = self.waiters.register(request.auth_request_id);

        match self.repo.create(&request).await? {
            CreateOutcome::Created => {}
            CreateOutcome::LostIdempotencyRace => {
                // A concurrent request with the same key committed first;
                // serve its request id instead of ours.
                drop(waiter);
                return self
                    .try_replay(&input, &request_fingerprint)
                    .await?
                    .ok_or_else(|| {
                        AuthorizationError::Internal(anyhow::anyhow!(
                            "idempotency race lost but binding not found"
                        ))
                    });
            }
        }

        tracing::info!(
            auth_request_id = %request.auth_request_id,
            restaurant_id = %request.restaurant_id,
            amount_minor = request.amount_minor,
            currency = %request.currency,
            "authorization request accepted"
        );

        // Fast path: wait up to W for a terminal outcome, either signaled by
        // a same-process worker or observed by polling the read model.
        let deadline = tokio::time::Instant::now() + self.fast_path_wait;
        let snapshot = loop {
            tokio::select! {
                signaled = waiter.wait() => {
                    if let Some(snapshot) = signaled {
                        break snapshot;
                    }
                    // Registry dropped; fall back to one last read.
                    break self.must_snapshot(request.auth_request_id).await?;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    break self.must_snapshot(request.auth_request_id).await?;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    let snapshot = self.must_snapshot(request.auth_request_id).await?;
                    if snapshot.status.is_terminal() {
                        break snapshot;
                    }
                }
            }
        };

        Ok(AuthorizeOutput {
            snapshot,
            replayed: false,
        })
    }

    async fn try_replay(
        &self,
        input: &AuthorizeInput,
        request_fingerprint: &str,
    ) -> Result<Option<AuthorizeOutput>, AuthorizationError> {
        let Some(binding) = self
            .repo
            .find_binding(
                input.restaurant_id,
                &input.idempotency_key,
                IdempotencyOperation::Authorize,
            )
            .await?
        else {
            return Ok(None);
        };

        if binding.fingerprint != request_fingerprint {
            return Err(AuthorizationError::IdempotencyConflict);
        }

        let snapshot = self.must_snapshot(binding.auth_request_id).await?;
        tracing::info!(
            auth_request_id = %binding.auth_request_id,
            status = %snapshot.status,
            "idempotent authorize replayed"
        );
        Ok(Some(AuthorizeOutput {
            snapshot,
            replayed: true,
        }))
    }

    async fn must_snapshot(
        &self,
        auth_request_id: Uuid,
    ) -> Result<AuthRequestSnapshot, AuthorizationError> {
        self.repo.snapshot(auth_request_id).await?.ok_or_else(|| {
            AuthorizationError::Internal(anyhow::anyhow!(
                "read model row missing for {auth_request_id}"
            ))
        })
    }
}

fn validate(input: &AuthorizeInput) -> Result<(), AuthorizationError> {
    if input.amount_minor <= 0 {
        return Err(AuthorizationError::Validation(
            "amount_minor must be positive".into(),
        ));
    }
    if !currency::is_supported(&input.currency) {
        return Err(AuthorizationError::Validation(format!(
            "unsupported currency: {}",
            input.currency
        )));
    }
    if input.idempotency_key.trim().is_empty() {
        return Err(AuthorizationError::Validation(
            "idempotency_key must not be empty".into(),
        ));
    }
    if input.payment_token.trim().is_empty() {
        return Err(AuthorizationError::Validation(
            "payment_token must not be empty".into(),
        ));
    }
    Ok(())
}
