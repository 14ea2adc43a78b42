use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use tably_authorization::error::AuthorizationError;
use tably_authorization::usecase::authorize::{AuthorizeInput, AuthorizeUseCase};
use tably_core::waiters::WaiterRegistry;
use tably_domain::status::AuthStatus;

use crate::helpers::MockAuthRepo;

fn input(restaurant_id: Uuid, idempotency_key: &str) -> AuthorizeInput {
    AuthorizeInput {
        restaurant_id,
        payment_token: "pt_abc123".to_owned(),
        amount_minor: 5000,
        currency: "USD".to_owned(),
        idempotency_key: idempotency_key.to_owned(),
        metadata: BTreeMap::new(),
    }
}

fn usecase(repo: MockAuthRepo) -> AuthorizeUseCase<MockAuthRepo> {
    AuthorizeUseCase {
        repo,
        waiters: WaiterRegistry::new(),
        fast_path_wait: Duration::from_millis(200),
        poll_interval: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn should_reject_zero_and_negative_amounts() {
    let restaurant_id = Uuid::new_v4();
    let under_test = usecase(MockAuthRepo::provisioned(restaurant_id));

    for amount in [0, -500] {
        let mut bad = input(restaurant_id, "idem-1");
        bad.amount_minor = amount;
        let result = under_test.execute(bad).await;
        assert!(
            matches!(result, Err(AuthorizationError::Validation(_))),
            "amount {amount} must be rejected, got {result:?}"
        );
    }
}

#[tokio::test]
async fn should_reject_unsupported_currency() {
    let restaurant_id = Uuid::new_v4();
    let under_test = usecase(MockAuthRepo::provisioned(restaurant_id));

    let mut bad = input(restaurant_id, "idem-1");
    bad.currency = "DOGE".to_owned();
    let result = under_test.execute(bad).await;
    assert!(matches!(result, Err(AuthorizationError::Validation(_))));
}

#[tokio::test]
async fn should_reject_empty_idempotency_key() {
    let restaurant_id = Uuid::new_v4();
    let under_test = usecase(MockAuthRepo::provisioned(restaurant_id));

    let result = under_test.execute(input(restaurant_id, "  ")).await;
    assert!(matches!(result, Err(AuthorizationError::Validation(_))));
}

#[tokio::test]
async fn should_reject_unprovisioned_restaurant() {
    let under_test = usecase(MockAuthRepo::default());

    let result = under_test.execute(input(Uuid::new_v4(), "idem-1")).await;
    assert!(matches!(result, Err(AuthorizationError::Validation(_))));
}

#[tokio::test]
async fn should_return_pending_after_fast_path_timeout() {
    let restaurant_id = Uuid::new_v4();
    let repo = MockAuthRepo::provisioned(restaurant_id);
    let under_test = usecase(repo.clone());

    let out = under_test.execute(input(restaurant_id, "idem-1")).await.unwrap();

    assert!(!out.replayed);
    assert_eq!(out.snapshot.status, AuthStatus::Pending);
    assert_eq!(repo.created_count(), 1);
}

#[tokio::test]
async fn should_return_terminal_result_when_waiter_is_signaled() {
    let restaurant_id = Uuid::new_v4();
    let repo = MockAuthRepo::provisioned(restaurant_id);
    let waiters: Arc<WaiterRegistry<_>> = WaiterRegistry::new();

    let under_test = AuthorizeUseCase {
        repo: repo.clone(),
        waiters: waiters.clone(),
        fast_path_wait: Duration::from_secs(5),
        poll_interval: Duration::from_millis(50),
    };

    // Simulate a same-process worker: once the request appears, flip it to
    // AUTHORIZED and signal the waiter.
    let worker_repo = repo.clone();
    tokio::spawn(async move {
        loop {
            let id = {
                let state = worker_repo.state.lock().unwrap();
                state.created.first().map(|r| r.auth_request_id)
            };
            if let Some(id) = id {
                worker_repo.set_status(id, AuthStatus::Authorized);
                let snapshot = {
                    let state = worker_repo.state.lock().unwrap();
                    state.snapshots.get(&id).cloned().unwrap()
                };
                waiters.notify(id, snapshot);
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let started = std::time::Instant::now();
    let out = under_test.execute(input(restaurant_id, "idem-1")).await.unwrap();

    assert_eq!(out.snapshot.status, AuthStatus::Authorized);
    assert!(
        started.elapsed() < Duration::from_secs(4),
        "fast path must resolve well before the wait bound"
    );
}

#[tokio::test]
async fn should_resolve_terminal_status_by_polling_the_read_model() {
    let restaurant_id = Uuid::new_v4();
    let repo = MockAuthRepo::provisioned(restaurant_id);

    let under_test = AuthorizeUseCase {
        repo: repo.clone(),
        waiters: WaiterRegistry::new(),
        fast_path_wait: Duration::from_secs(5),
        poll_interval: Duration::from_millis(20),
    };

    // A worker in another process: updates the read model, no waiter signal.
    let worker_repo = repo.clone();
    tokio::spawn(async move {
        loop {
            let id = {
                let state = worker_repo.state.lock().unwrap();
                state.created.first().map(|r| r.auth_request_id)
            };
            if let Some(id) = id {
                tokio::time::sleep(Duration::from_millis(40)).await;
                worker_repo.set_status(id, AuthStatus::Denied);
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let out = under_test.execute(input(restaurant_id, "idem-1")).await.unwrap();
    assert_eq!(out.snapshot.status, AuthStatus::Denied);
}

#[tokio::test]
async fn should_replay_same_request_id_for_same_idempotency_key() {
    let restaurant_id = Uuid::new_v4();
    let repo = MockAuthRepo::provisioned(restaurant_id);
    let under_test = usecase(repo.clone());

    let first = under_test.execute(input(restaurant_id, "idem-2")).await.unwrap();
    let second = under_test.execute(input(restaurant_id, "idem-2")).await.unwrap();

    assert_eq!(
        first.snapshot.auth_request_id,
        second.snapshot.auth_request_id
    );
    assert!(second.replayed);
    assert_eq!(repo.created_count(), 1, "no second AuthRequestCreated");
}

#[tokio::test]
async fn should_conflict_when_key_is_reused_with_different_body() {
    let restaurant_id = Uuid::new_v4();
    let repo = MockAuthRepo::provisioned(restaurant_id);
    let under_test = usecase(repo);

    under_test.execute(input(restaurant_id, "idem-3")).await.unwrap();

    let mut changed = input(restaurant_id, "idem-3");
    changed.amount_minor = 9999;
    let result = under_test.execute(changed).await;
    assert!(matches!(result, Err(AuthorizationError::IdempotencyConflict)));
}

#[tokio::test]
async fn should_serve_winner_binding_after_losing_concurrent_race() {
    let restaurant_id = Uuid::new_v4();
    let repo = MockAuthRepo::provisioned(restaurant_id);
    let winner_id = Uuid::new_v4();
    repo.state.lock().unwrap().race_winner = Some(winner_id);

    let under_test = usecase(repo.clone());
    let out = under_test.execute(input(restaurant_id, "idem-4")).await.unwrap();

    assert_eq!(out.snapshot.auth_request_id, winner_id);
    assert!(out.replayed);
    assert_eq!(repo.created_count(), 0, "our insert never committed");
}
