use chrono::{Duration, Utc};
use uuid::Uuid;

use tably_domain::id::PaymentTokenId;
use tably_payment_token::domain::encryption::AeadKey;
use tably_payment_token::error::TokenServiceError;
use tably_payment_token::usecase::get_token::GetTokenUseCase;
use tably_testing::cards::PAN_VISA_SUCCESS;

use crate::helpers::{MockTokenRepo, stored_token};

#[tokio::test]
async fn should_return_metadata_without_sensitive_fields() {
    let restaurant_id = Uuid::new_v4();
    let record = stored_token(restaurant_id, &AeadKey::generate(), PAN_VISA_SUCCESS);
    let token_id = record.token_id.clone();
    let repo = MockTokenRepo::default();
    repo.insert(record);

    let out = GetTokenUseCase { tokens: repo }
        .execute(&token_id, restaurant_id)
        .await
        .unwrap();

    assert_eq!(out.metadata.card_brand, "visa");
    assert_eq!(out.metadata.last4, "4242");
    assert_eq!(out.metadata.exp_month, 12);
}

#[tokio::test]
async fn should_hide_unknown_and_foreign_tokens_identically() {
    let restaurant_id = Uuid::new_v4();
    let record = stored_token(restaurant_id, &AeadKey::generate(), PAN_VISA_SUCCESS);
    let token_id = record.token_id.clone();
    let repo = MockTokenRepo::default();
    repo.insert(record);
    let under_test = GetTokenUseCase { tokens: repo };

    let unknown = under_test
        .execute(&PaymentTokenId::generate(), restaurant_id)
        .await;
    let foreign = under_test.execute(&token_id, Uuid::new_v4()).await;

    assert!(matches!(unknown, Err(TokenServiceError::NotFound)));
    assert!(matches!(foreign, Err(TokenServiceError::NotFound)));
}

#[tokio::test]
async fn should_report_expired_for_token_past_ttl() {
    let restaurant_id = Uuid::new_v4();
    let mut record = stored_token(restaurant_id, &AeadKey::generate(), PAN_VISA_SUCCESS);
    record.expires_at = Utc::now() - Duration::hours(1);
    let token_id = record.token_id.clone();
    let repo = MockTokenRepo::default();
    repo.insert(record);

    let result = GetTokenUseCase { tokens: repo }
        .execute(&token_id, restaurant_id)
        .await;
    assert!(matches!(result, Err(TokenServiceError::Expired)));
}
