use uuid::Uuid;

use tably_domain::fingerprint::fingerprint;
use tably_domain::status::AuthStatus;

use crate::domain::repository::AuthRequestRepository;
use crate::domain::types::{CreateOutcome, IdempotencyOperation};
use crate::error::AuthorizationError;

pub struct VoidInput {
    pub restaurant_id: Uuid,
    pub auth_request_id: Uuid,
    pub reason: String,
    pub idempotency_key: String,
}

#[derive(Debug)]
pub struct VoidOutput {
    pub auth_request_id: Uuid,
    /// Status at the time the void was recorded; the worker folds the void
    /// into the state machine asynchronously.
    pub status: AuthStatus,
    pub replayed: bool,
}

pub struct VoidUseCase<R: AuthRequestRepository> {
    pub repo: R,
}

impl<R: AuthRequestRepository> VoidUseCase<R> {
    pub async fn execute(&self, input: VoidInput) -> Result<VoidOutput, AuthorizationError> {
        if input.idempotency_key.trim().is_empty() {
            return Err(AuthorizationError::Validation(
                "idempotency_key must not be empty".into(),
            ));
        }

        let snapshot = self
            .repo
            .snapshot_for(input.restaurant_id, input.auth_request_id)
            .await?
            .ok_or(AuthorizationError::NotFound)?;

        let request_fingerprint = fingerprint(&[
            &input.restaurant_id.to_string(),
            &input.auth_request_id.to_string(),
            "void",
            &input.reason,
        ]);

        // Void keys dedupe only voids; an authorize binding under the same
        // key is a different operation and never matches here.
        if let Some(binding) = self
            .repo
            .find_binding(
                input.restaurant_id,
                &input.idempotency_key,
                IdempotencyOperation::Void,
            )
            .await?
        {
            if binding.fingerprint != request_fingerprint {
                return Err(AuthorizationError::IdempotencyConflict);
            }
            return Ok(VoidOutput {
                auth_request_id: input.auth_request_id,
                status: snapshot.status,
                replayed: true,
            });
        }

        let outcome = self
            .repo
            .record_void(
                input.auth_request_id,
                input.restaurant_id,
                &input.reason,
                &input.idempotency_key,
                &request_fingerprint,
            )
            .await?;

        tracing::info!(
            auth_request_id = %input.auth_request_id,
            reason = %input.reason,
            "void requested"
        );

        Ok(VoidOutput {
            auth_request_id: input.auth_request_id,
            status: snapshot.status,
            replayed: outcome == CreateOutcome::LostIdempotencyRace,
        })
    }
}
