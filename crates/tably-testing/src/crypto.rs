//! Client-side payload sealing, as a browser or terminal would do it.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore as _;

use tably_domain::card::PaymentData;

/// Development primary key (hex); pairs with `PRIMARY_ENCRYPTION_KEY`.
pub const TEST_PRIMARY_KEY_HEX: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

/// Encrypt card data the way a named-key client does: AES-256-GCM with a
/// fresh IV, ciphertext and IV base64'd separately.
///
/// Returns `(encrypted_payment_data_b64, iv_b64)`.
pub fn seal_with_named_key(key_hex: &str, card: &PaymentData) -> (String, String) {
    let key_bytes = hex::decode(key_hex).expect("test key must be hex");
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

    let mut iv = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut iv);

    let plaintext = serde_json::to_vec(card).expect("serialize card");
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_slice())
        .expect("seal card payload");

    (BASE64.encode(ciphertext), BASE64.encode(iv))
}
