use uuid::Uuid;

use tably_authorization::error::AuthorizationError;
use tably_authorization::usecase::status::GetStatusUseCase;
use tably_domain::status::AuthStatus;

use crate::helpers::{MockAuthRepo, snapshot_from_new};
use tably_authorization::domain::types::NewAuthRequest;

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

#[tokio::test]
async fn should_return_current_snapshot_for_owner() {
    let restaurant_id = Uuid::new_v4();
    let auth_request_id = Uuid::new_v4();
    let repo = seeded_repo(restaurant_id, auth_request_id);
    repo.set_status(auth_request_id, AuthStatus::Authorized);

    let under_test = GetStatusUseCase { repo };
    let snapshot = under_test
        .execute(restaurant_id, auth_request_id)
        .await
        .unwrap();
    assert_eq!(snapshot.status, AuthStatus::Authorized);
}

#[tokio::test]
async fn should_return_not_found_for_unknown_id() {
    let under_test = GetStatusUseCase {
        repo: MockAuthRepo::default(),
    };
    let result = under_test.execute(Uuid::new_v4(), Uuid::new_v4()).await;
    assert!(matches!(result, Err(AuthorizationError::NotFound)));
}

#[tokio::test]
async fn should_hide_foreign_requests_as_not_found() {
    let restaurant_id = Uuid::new_v4();
    let auth_request_id = Uuid::new_v4();
    let repo = seeded_repo(restaurant_id, auth_request_id);

    let under_test = GetStatusUseCase { repo };
    let result = under_test.execute(Uuid::new_v4(), auth_request_id).await;
    assert!(
        matches!(result, Err(AuthorizationError::NotFound)),
        "foreign tenant must be indistinguishable from unknown id"
    );
}
