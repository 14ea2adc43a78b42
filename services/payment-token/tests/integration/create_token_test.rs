use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use uuid::Uuid;

use tably_payment_token::domain::encryption::{
    AeadKey, EncryptedData, decrypt_with_key, derive_device_key, encrypt_with_key,
};
use tably_payment_token::error::TokenServiceError;
use tably_payment_token::usecase::create_token::{
    ClientCredential, ClientKeyResolver, CreateTokenInput, CreateTokenUseCase,
};
use tably_domain::card::PaymentData;
use tably_testing::cards::{PAN_VISA_SUCCESS, test_card};
use tably_testing::crypto::{TEST_PRIMARY_KEY_HEX, seal_with_named_key};

use crate::helpers::{MockKeyStore, MockTokenRepo, SERVICE_KEY_VERSION};

fn named_key_credential(iv_b64: &str) -> ClientCredential {
    ClientCredential::EncryptionMetadata {
        key_id: "primary".to_owned(),
        algorithm: "AES-256-GCM".to_owned(),
        iv: BASE64.decode(iv_b64).unwrap(),
    }
}

fn usecase(
    repo: MockTokenRepo,
    keys: MockKeyStore,
) -> CreateTokenUseCase<MockTokenRepo, MockKeyStore> {
    CreateTokenUseCase {
        tokens: repo,
        keys,
        resolver: ClientKeyResolver {
            primary_key: Some(AeadKey::from_hex(TEST_PRIMARY_KEY_HEX).unwrap()),
            base_derivation_key: Some(AeadKey::from_hex(TEST_PRIMARY_KEY_HEX).unwrap()),
        },
        token_ttl_hours: 24,
    }
}

fn named_key_input(restaurant_id: Uuid, idempotency_key: Option<&str>) -> CreateTokenInput {
    let (payload_b64, iv_b64) = seal_with_named_key(TEST_PRIMARY_KEY_HEX, &test_card(PAN_VISA_SUCCESS));
    CreateTokenInput {
        restaurant_id,
        encrypted_payment_data: BASE64.decode(payload_b64).unwrap(),
        credential: named_key_credential(&iv_b64),
        idempotency_key: idempotency_key.map(str::to_owned),
        client_metadata: None,
    }
}

#[tokio::test]
async fn should_mint_token_from_named_key_payload() {
    let restaurant_id = Uuid::new_v4();
    let repo = MockTokenRepo::default();
    let service_key = AeadKey::generate();
    let keys = MockKeyStore::single(SERVICE_KEY_VERSION, service_key.clone());

    let out = usecase(repo.clone(), keys)
        .execute(named_key_input(restaurant_id, None))
        .await
        .unwrap();

    assert!(out.token_id.as_str().starts_with("pt_"));
    assert!(!out.replayed);
    assert_eq!(out.metadata.card_brand, "visa");
    assert_eq!(out.metadata.last4, "4242");

    // The stored ciphertext decrypts under the service key back to the card.
    let state = repo.state.lock().unwrap();
    let record = state.tokens.get(out.token_id.as_str()).unwrap();
    assert_eq!(record.service_key_version, SERVICE_KEY_VERSION);
    let sealed = EncryptedData::from_parts(record.ciphertext.clone(), &record.nonce).unwrap();
    let plaintext = decrypt_with_key(&service_key, &sealed).unwrap();
    let card = PaymentData::from_bytes(&plaintext).unwrap();
    assert_eq!(card.card_number, PAN_VISA_SUCCESS);
}

#[tokio::test]
async fn should_mint_token_from_device_encrypted_payload() {
    let restaurant_id = Uuid::new_v4();
    let repo = MockTokenRepo::default();
    let keys = MockKeyStore::single(SERVICE_KEY_VERSION, AeadKey::generate());

    // Seal the card the way a terminal does: derived key, nonce prepended.
    let bdk = AeadKey::from_hex(TEST_PRIMARY_KEY_HEX).unwrap();
    let device_key = derive_device_key(&bdk, "terminal-042").unwrap();
    let card = test_card(PAN_VISA_SUCCESS);
    let sealed = encrypt_with_key(&device_key, &card.to_bytes().unwrap()).unwrap();
    let mut payload = sealed.nonce.to_vec();
    payload.extend_from_slice(&sealed.ciphertext);

    let out = usecase(repo.clone(), keys)
        .execute(CreateTokenInput {
            restaurant_id,
            encrypted_payment_data: payload,
            credential: ClientCredential::DeviceToken("terminal-042".to_owned()),
            idempotency_key: None,
            client_metadata: None,
        })
        .await
        .unwrap();

    assert_eq!(out.metadata.last4, "4242");
    assert_eq!(repo.token_count(), 1);
    let state = repo.state.lock().unwrap();
    assert_eq!(
        state.tokens[out.token_id.as_str()].origin_key_id,
        "device:terminal-042"
    );
}

#[tokio::test]
async fn should_replay_create_for_same_idempotency_key() {
    let restaurant_id = Uuid::new_v4();
    let repo = MockTokenRepo::default();
    let keys = MockKeyStore::single(SERVICE_KEY_VERSION, AeadKey::generate());
    let under_test = usecase(repo.clone(), keys);

    // Identical payload both times, as a client retry would send.
    let input = named_key_input(restaurant_id, Some("tok-idem-1"));
    let replay = CreateTokenInput {
        restaurant_id,
        encrypted_payment_data: input.encrypted_payment_data.clone(),
        credential: input.credential.clone(),
        idempotency_key: input.idempotency_key.clone(),
        client_metadata: None,
    };

    let first = under_test.execute(input).await.unwrap();
    let second = under_test.execute(replay).await.unwrap();

    assert_eq!(first.token_id, second.token_id);
    assert!(second.replayed);
    assert_eq!(repo.token_count(), 1);
}

#[tokio::test]
async fn should_conflict_when_key_reused_with_different_payload() {
    let restaurant_id = Uuid::new_v4();
    let repo = MockTokenRepo::default();
    let keys = MockKeyStore::single(SERVICE_KEY_VERSION, AeadKey::generate());
    let under_test = usecase(repo, keys);

    under_test
        .execute(named_key_input(restaurant_id, Some("tok-idem-2")))
        .await
        .unwrap();

    // Fresh payload (fresh IV) under the same idempotency key.
    let result = under_test
        .execute(named_key_input(restaurant_id, Some("tok-idem-2")))
        .await;
    assert!(matches!(result, Err(TokenServiceError::IdempotencyConflict)));
}

#[tokio::test]
async fn should_reject_unknown_key_id() {
    let restaurant_id = Uuid::new_v4();
    let keys = MockKeyStore::single(SERVICE_KEY_VERSION, AeadKey::generate());
    let under_test = usecase(MockTokenRepo::default(), keys);

    let (payload_b64, iv_b64) = seal_with_named_key(TEST_PRIMARY_KEY_HEX, &test_card(PAN_VISA_SUCCESS));
    let result = under_test
        .execute(CreateTokenInput {
            restaurant_id,
            encrypted_payment_data: BASE64.decode(payload_b64).unwrap(),
            credential: ClientCredential::EncryptionMetadata {
                key_id: "ak_00000000000000000000".to_owned(),
                algorithm: "AES-256-GCM".to_owned(),
                iv: BASE64.decode(iv_b64).unwrap(),
            },
            idempotency_key: None,
            client_metadata: None,
        })
        .await;
    assert!(matches!(result, Err(TokenServiceError::UnknownKey)));
}

#[tokio::test]
async fn should_reject_non_aead_algorithm() {
    let restaurant_id = Uuid::new_v4();
    let keys = MockKeyStore::single(SERVICE_KEY_VERSION, AeadKey::generate());
    let under_test = usecase(MockTokenRepo::default(), keys);

    let (payload_b64, iv_b64) = seal_with_named_key(TEST_PRIMARY_KEY_HEX, &test_card(PAN_VISA_SUCCESS));
    let result = under_test
        .execute(CreateTokenInput {
            restaurant_id,
            encrypted_payment_data: BASE64.decode(payload_b64).unwrap(),
            credential: ClientCredential::EncryptionMetadata {
                key_id: "primary".to_owned(),
                algorithm: "AES-256-CBC".to_owned(),
                iv: BASE64.decode(iv_b64).unwrap(),
            },
            idempotency_key: None,
            client_metadata: None,
        })
        .await;
    assert!(matches!(result, Err(TokenServiceError::Validation(_))));
}

#[tokio::test]
async fn should_fail_decryption_with_wrong_client_key() {
    let restaurant_id = Uuid::new_v4();
    let keys = MockKeyStore::single(SERVICE_KEY_VERSION, AeadKey::generate());
    let under_test = usecase(MockTokenRepo::default(), keys);

    // Sealed under a key that is NOT the configured primary key.
    let other_key_hex = "ff".repeat(32);
    let (payload_b64, iv_b64) = seal_with_named_key(&other_key_hex, &test_card(PAN_VISA_SUCCESS));
    let result = under_test
        .execute(CreateTokenInput {
            restaurant_id,
            encrypted_payment_data: BASE64.decode(payload_b64).unwrap(),
            credential: named_key_credential(&iv_b64),
            idempotency_key: None,
            client_metadata: None,
        })
        .await;
    assert!(matches!(result, Err(TokenServiceError::DecryptionFailed)));
}
