// Shared mocks for the integration test suite. Kept as a sibling module so
// every test file sees the same repository fakes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use tably_authorization::domain::repository::AuthRequestRepository;
use tably_authorization::domain::types::{
    AuthRequestSnapshot, CreateOutcome, IdempotencyBinding, IdempotencyOperation, NewAuthRequest,
};
use tably_authorization::error::AuthorizationError;
use tably_domain::status::AuthStatus;

#[derive(Default)]
pub struct RepoState {
    pub provisioned: Vec<Uuid>,
    pub bindings: HashMap<(Uuid, String, &'static str), IdempotencyBinding>,
    pub snapshots: HashMap<Uuid, AuthRequestSnapshot>,
    pub created: Vec<NewAuthRequest>,
    pub voids: Vec<(Uuid, String)>,
    /// When set, the next `create` reports a lost idempotency race and
    /// installs this id as the concurrent winner's binding.
    pub race_winner: Option<Uuid>,
}

#[derive(Clone, Default)]
pub struct MockAuthRepo {
    pub state: Arc<Mutex<RepoState>>,
}

impl MockAuthRepo {
    pub fn provisioned(restaurant_id: Uuid) -> Self {
        let repo = Self::default();
        repo.state.lock().unwrap().provisioned.push(restaurant_id);
        repo
    }

    pub fn set_status(&self, auth_request_id: Uuid, status: AuthStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(snapshot) = state.snapshots.get_mut(&auth_request_id) {
            snapshot.status = status;
            snapshot.updated_at = Utc::now();
        }
    }

    pub fn created_count(&self) -> usize {
        self.state.lock().unwrap().created.len()
    }

    pub fn void_count(&self) -> usize {
        self.state.lock().unwrap().voids.len()
    }
}

pub fn snapshot_from_new(request: &NewAuthRequest) -> AuthRequestSnapshot {
    let now = Utc::now();
    AuthRequestSnapshot {
        auth_request_id: request.auth_request_id,
        restaurant_id: request.restaurant_id,
        payment_token: request.payment_token.clone(),
        status: AuthStatus::Pending,
        amount_minor: request.amount_minor,
        currency: request.currency.clone(),
        processor_name: None,
        processor_auth_id: None,
        authorization_code: None,
        authorized_amount_minor: None,
        denial_code: None,
        denial_reason: None,
        error_message: None,
        retry_count: 0,
        created_at: now,
        updated_at: now,
    }
}

impl AuthRequestRepository for MockAuthRepo {
    async fn restaurant_provisioned(
        &self,
        restaurant_id: Uuid,
    ) -> Result<bool, AuthorizationError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .provisioned
            .contains(&restaurant_id))
    }

    async fn find_binding(
        &self,
        restaurant_id: Uuid,
        idempotency_key: &str,
        operation: IdempotencyOperation,
    ) -> Result<Option<IdempotencyBinding>, AuthorizationError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .bindings
            .get(&(restaurant_id, idempotency_key.to_owned(), operation.as_str()))
            .cloned())
    }

    async fn create(&self, request: &NewAuthRequest) -> Result<CreateOutcome, AuthorizationError> {
        let mut state = self.state.lock().unwrap();
        if let Some(winner_id) = state.race_winner.take() {
            // Simulate a concurrent same-key request committing first: its
            // binding and read-model row exist by the time our insert fails.
            state.bindings.insert(
                (
                    request.restaurant_id,
                    request.idempotency_key.clone(),
                    IdempotencyOperation::Authorize.as_str(),
                ),
                IdempotencyBinding {
                    auth_request_id: winner_id,
                    fingerprint: request.fingerprint.clone(),
                },
            );
            let mut winner = snapshot_from_new(request);
            winner.auth_request_id = winner_id;
            state.snapshots.insert(winner_id, winner);
            return Ok(CreateOutcome::LostIdempotencyRace);
        }
        state.bindings.insert(
            (
                request.restaurant_id,
                request.idempotency_key.clone(),
                IdempotencyOperation::Authorize.as_str(),
            ),
            IdempotencyBinding {
                auth_request_id: request.auth_request_id,
                fingerprint: request.fingerprint.clone(),
            },
        );
        state
            .snapshots
            .insert(request.auth_request_id, snapshot_from_new(request));
        state.created.push(request.clone());
        Ok(CreateOutcome::Created)
    }

    async fn snapshot(
        &self,
        auth_request_id: Uuid,
    ) -> Result<Option<AuthRequestSnapshot>, AuthorizationError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .snapshots
            .get(&auth_request_id)
            .cloned())
    }

    async fn snapshot_for(
        &self,
        restaurant_id: Uuid,
        auth_request_id: Uuid,
    ) -> Result<Option<AuthRequestSnapshot>, AuthorizationError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .snapshots
            .get(&auth_request_id)
            .filter(|snapshot| snapshot.restaurant_id == restaurant_id)
            .cloned())
    }

    async fn record_void(
        &self,
        auth_request_id: Uuid,
        restaurant_id: Uuid,
        reason: &str,
        idempotency_key: &str,
        fingerprint: &str,
    ) -> Result<CreateOutcome, AuthorizationError> {
        let mut state = self.state.lock().unwrap();
        state.voids.push((auth_request_id, reason.to_owned()));
        state.bindings.insert(
            (
                restaurant_id,
                idempotency_key.to_owned(),
                IdempotencyOperation::Void.as_str(),
            ),
            IdempotencyBinding {
                auth_request_id,
                fingerprint: fingerprint.to_owned(),
            },
        );
        Ok(CreateOutcome::Created)
    }
}
