use chrono::{Duration, Utc};
use uuid::Uuid;

use tably_domain::id::PaymentTokenId;
use tably_payment_token::domain::encryption::AeadKey;
use tably_payment_token::error::TokenServiceError;
use tably_payment_token::usecase::decrypt_token::{DecryptTokenInput, DecryptTokenUseCase};
use tably_testing::cards::PAN_VISA_SUCCESS;

use crate::helpers::{MockAudit, MockKeyStore, MockTokenRepo, SERVICE_KEY_VERSION, stored_token};

const WORKER: &str = "auth-processor-worker";

fn usecase(
    repo: MockTokenRepo,
    keys: MockKeyStore,
    audit: MockAudit,
) -> DecryptTokenUseCase<MockTokenRepo, MockKeyStore, MockAudit> {
    DecryptTokenUseCase {
        tokens: repo,
        keys,
        audit,
        allowed_services: vec![
            "auth-processor-worker".to_owned(),
            "void-processor-worker".to_owned(),
        ],
    }
}

fn decrypt_input(token_id: PaymentTokenId, restaurant_id: Uuid, service: &str) -> DecryptTokenInput {
    DecryptTokenInput {
        token_id,
        restaurant_id,
        requesting_service: service.to_owned(),
        correlation_id: Some("req-123".to_owned()),
    }
}

#[tokio::test]
async fn should_release_plaintext_to_allowed_service_and_audit_success() {
    let restaurant_id = Uuid::new_v4();
    let service_key = AeadKey::generate();
    let record = stored_token(restaurant_id, &service_key, PAN_VISA_SUCCESS);
    let token_id = record.token_id.clone();

    let repo = MockTokenRepo::default();
    repo.insert(record);
    let audit = MockAudit::default();

    let card = usecase(
        repo,
        MockKeyStore::single(SERVICE_KEY_VERSION, service_key),
        audit.clone(),
    )
    .execute(decrypt_input(token_id, restaurant_id, WORKER))
    .await
    .unwrap();

    assert_eq!(card.card_number, PAN_VISA_SUCCESS);
    assert_eq!(audit.results(), vec!["success"]);

    let entries = audit.entries.lock().unwrap();
    assert_eq!(entries[0].requesting_service, WORKER);
    assert_eq!(entries[0].correlation_id.as_deref(), Some("req-123"));
}

#[tokio::test]
async fn should_forbid_service_not_on_allow_list() {
    let restaurant_id = Uuid::new_v4();
    let service_key = AeadKey::generate();
    let record = stored_token(restaurant_id, &service_key, PAN_VISA_SUCCESS);
    let token_id = record.token_id.clone();

    let repo = MockTokenRepo::default();
    repo.insert(record);
    let audit = MockAudit::default();

    let result = usecase(
        repo,
        MockKeyStore::single(SERVICE_KEY_VERSION, service_key),
        audit.clone(),
    )
    .execute(decrypt_input(token_id, restaurant_id, "reporting-service"))
    .await;

    assert!(matches!(result, Err(TokenServiceError::Forbidden)));
    assert_eq!(audit.results(), vec!["denied"]);
}

#[tokio::test]
async fn should_forbid_foreign_restaurant() {
    let service_key = AeadKey::generate();
    let record = stored_token(Uuid::new_v4(), &service_key, PAN_VISA_SUCCESS);
    let token_id = record.token_id.clone();

    let repo = MockTokenRepo::default();
    repo.insert(record);
    let audit = MockAudit::default();

    let result = usecase(
        repo,
        MockKeyStore::single(SERVICE_KEY_VERSION, service_key),
        audit.clone(),
    )
    .execute(decrypt_input(token_id, Uuid::new_v4(), WORKER))
    .await;

    assert!(matches!(result, Err(TokenServiceError::Forbidden)));
    assert_eq!(audit.results(), vec!["denied"]);
}

#[tokio::test]
async fn should_audit_misses_for_unknown_tokens() {
    let audit = MockAudit::default();
    let result = usecase(
        MockTokenRepo::default(),
        MockKeyStore::single(SERVICE_KEY_VERSION, AeadKey::generate()),
        audit.clone(),
    )
    .execute(decrypt_input(
        PaymentTokenId::generate(),
        Uuid::new_v4(),
        WORKER,
    ))
    .await;

    assert!(matches!(result, Err(TokenServiceError::NotFound)));
    assert_eq!(audit.results(), vec!["not_found"]);
}

#[tokio::test]
async fn should_never_decrypt_expired_tokens() {
    let restaurant_id = Uuid::new_v4();
    let service_key = AeadKey::generate();
    let mut record = stored_token(restaurant_id, &service_key, PAN_VISA_SUCCESS);
    record.expires_at = Utc::now() - Duration::seconds(5);
    let token_id = record.token_id.clone();

    let repo = MockTokenRepo::default();
    repo.insert(record);
    let audit = MockAudit::default();

    let result = usecase(
        repo,
        MockKeyStore::single(SERVICE_KEY_VERSION, service_key),
        audit.clone(),
    )
    .execute(decrypt_input(token_id, restaurant_id, WORKER))
    .await;

    assert!(matches!(result, Err(TokenServiceError::Expired)));
    assert_eq!(audit.results(), vec!["expired"]);
}

#[tokio::test]
async fn should_decrypt_old_tokens_under_their_stored_key_version() {
    let restaurant_id = Uuid::new_v4();
    let old_key = AeadKey::generate();
    let record = stored_token(restaurant_id, &old_key, PAN_VISA_SUCCESS);
    let token_id = record.token_id.clone();

    let repo = MockTokenRepo::default();
    repo.insert(record);

    // A newer current key is installed; the old version must still resolve.
    let mut keys = std::collections::HashMap::new();
    keys.insert(SERVICE_KEY_VERSION.to_owned(), old_key);
    keys.insert("v2".to_owned(), AeadKey::generate());
    let key_store = MockKeyStore {
        keys: std::sync::Arc::new(keys),
        current: "v2".to_owned(),
    };

    let card = usecase(repo, key_store, MockAudit::default())
        .execute(decrypt_input(token_id, restaurant_id, WORKER))
        .await
        .unwrap();
    assert_eq!(card.card_number, PAN_VISA_SUCCESS);
}
