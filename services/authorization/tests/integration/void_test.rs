use uuid::Uuid;

use tably_authorization::domain::types::NewAuthRequest;
use tably_authorization::error::AuthorizationError;
use tably_authorization::usecase::void::{VoidInput, VoidUseCase};
use tably_domain::status::AuthStatus;

use crate::helpers::{MockAuthRepo, snapshot_from_new};

fn seeded_repo(restaurant_id: Uuid, auth_request_id: Uuid) -> MockAuthRepo {
    let repo = MockAuthRepo::provisioned(restaurant_id);
    let request = NewAuthRequest {
        auth_request_id,
        restaurant_id,
        payment_token: "pt_abc".into(),
        amount_minor: 5000,
        currency: "USD".into(),
        metadata: Default::default(),
        idempotency_key: "idem".into(),
        fingerprint: "fp".into(),
    };
    repo.state
        .lock()
        .unwrap()
        .snapshots
        .insert(auth_request_id, snapshot_from_new(&request));
    repo
}

fn void_input(restaurant_id: Uuid, auth_request_id: Uuid, key: &str) -> VoidInput {
    VoidInput {
        restaurant_id,
        auth_request_id,
        reason: "customer_cancelled".into(),
        idempotency_key: key.into(),
    }
}

#[tokio::test]
async fn should_record_void_once_for_repeated_idempotency_key() {
    let restaurant_id = Uuid::new_v4();
    let auth_request_id = Uuid::new_v4();
    let repo = seeded_repo(restaurant_id, auth_request_id);
    let under_test = VoidUseCase { repo: repo.clone() };

    let first = under_test
        .execute(void_input(restaurant_id, auth_request_id, "void-1"))
        .await
        .unwrap();
    let second = under_test
        .execute(void_input(restaurant_id, auth_request_id, "void-1"))
        .await
        .unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(repo.void_count(), 1, "single AuthVoidRequested event");
}

#[tokio::test]
async fn should_conflict_on_void_key_reuse_with_different_reason() {
    let restaurant_id = Uuid::new_v4();
    let auth_request_id = Uuid::new_v4();
    let repo = seeded_repo(restaurant_id, auth_request_id);
    let under_test = VoidUseCase { repo };

    under_test
        .execute(void_input(restaurant_id, auth_request_id, "void-2"))
        .await
        .unwrap();

    let mut changed = void_input(restaurant_id, auth_request_id, "void-2");
    changed.reason = "fraud_suspected".into();
    let result = under_test.execute(changed).await;
    assert!(matches!(result, Err(AuthorizationError::IdempotencyConflict)));
}

#[tokio::test]
async fn should_return_not_found_for_foreign_request() {
    let restaurant_id = Uuid::new_v4();
    let auth_request_id = Uuid::new_v4();
    let repo = seeded_repo(restaurant_id, auth_request_id);
    let under_test = VoidUseCase { repo };

    let result = under_test
        .execute(void_input(Uuid::new_v4(), auth_request_id, "void-3"))
        .await;
    assert!(matches!(result, Err(AuthorizationError::NotFound)));
}

#[tokio::test]
async fn should_not_collide_with_authorize_idempotency_keys() {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use tably_authorization::usecase::authorize::{AuthorizeInput, AuthorizeUseCase};
    use tably_core::waiters::WaiterRegistry;

    let restaurant_id = Uuid::new_v4();
    let repo = MockAuthRepo::provisioned(restaurant_id);

    // A client (erroneously) reuses one idempotency key for the create and
    // the later void. The operations dedupe independently.
    let authorize = AuthorizeUseCase {
        repo: repo.clone(),
        waiters: WaiterRegistry::new(),
        fast_path_wait: Duration::from_millis(50),
        poll_interval: Duration::from_millis(10),
    };
    let created = authorize
        .execute(AuthorizeInput {
            restaurant_id,
            payment_token: "pt_abc".into(),
            amount_minor: 5000,
            currency: "USD".into(),
            idempotency_key: "shared-key".into(),
            metadata: BTreeMap::new(),
        })
        .await
        .unwrap();

    let under_test = VoidUseCase { repo: repo.clone() };
    let out = under_test
        .execute(void_input(
            restaurant_id,
            created.snapshot.auth_request_id,
            "shared-key",
        ))
        .await
        .unwrap();

    assert!(!out.replayed, "void must not match the authorize binding");
    assert_eq!(repo.void_count(), 1);
}

#[tokio::test]
async fn should_report_current_status_with_void_request() {
    let restaurant_id = Uuid::new_v4();
    let auth_request_id = Uuid::new_v4();
    let repo = seeded_repo(restaurant_id, auth_request_id);
    repo.set_status(auth_request_id, AuthStatus::Authorized);
    let under_test = VoidUseCase { repo };

    let out = under_test
        .execute(void_input(restaurant_id, auth_request_id, "void-4"))
        .await
        .unwrap();
    assert_eq!(out.status, AuthStatus::Authorized);
}
