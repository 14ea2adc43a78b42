//! AES-256-GCM envelope encryption and HKDF device-key derivation.
//!
//! Card data is decrypted once under the key the client encrypted with (a
//! device-derived key or a named key), then re-encrypted under the current
//! service key version. Only authenticated AEAD is accepted; plaintext and
//! key material are zeroized on drop.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// GCM standard 96-bit nonce.
pub const NONCE_LEN: usize = 12;

/// HKDF info prefix; versioned so a future derivation change can rotate.
const DEVICE_KEY_INFO_PREFIX: &[u8] = b"payment-token-v1:";

/// The only algorithm the create surface accepts.
pub const AEAD_ALGORITHM: &str = "AES-256-GCM";

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("key must be 32 bytes")]
    InvalidKeyLength,
    #[error("nonce must be {NONCE_LEN} bytes")]
    InvalidNonceLength,
    #[error("encryption failed")]
    EncryptionFailed,
    // One opaque variant for wrong key, tampered data, or truncation; the
    // distinction must not leak to callers.
    #[error("decryption failed")]
    DecryptionFailed,
}

/// A 256-bit AEAD key. Zeroized on drop; deliberately no Debug.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AeadKey([u8; 32]);

impl AeadKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(hex_key: &str) -> Result<Self, EncryptionError> {
        let bytes = hex::decode(hex_key).map_err(|_| EncryptionError::InvalidKeyLength)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| EncryptionError::InvalidKeyLength)?;
        Ok(Self(arr))
    }

    /// Fresh random key, e.g. when installing a new service-key version.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Ciphertext (with the GCM tag appended) plus the nonce it was sealed with.
#[derive(Clone)]
pub struct EncryptedData {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
}

impl EncryptedData {
    pub fn from_parts(ciphertext: Vec<u8>, nonce: &[u8]) -> Result<Self, EncryptionError> {
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| EncryptionError::InvalidNonceLength)?;
        Ok(Self { ciphertext, nonce })
    }
}

/// Encrypt with a fresh random nonce.
pub fn encrypt_with_key(key: &AeadKey, plaintext: &[u8]) -> Result<EncryptedData, EncryptionError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| EncryptionError::EncryptionFailed)?;

    Ok(EncryptedData { ciphertext, nonce })
}

/// Decrypt and verify the authentication tag.
pub fn decrypt_with_key(
    key: &AeadKey,
    encrypted: &EncryptedData,
) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(&encrypted.nonce), encrypted.ciphertext.as_slice())
        .map_err(|_| EncryptionError::DecryptionFailed)
}

/// Derive the device-specific key from the base derivation key. RFC 5869
/// HKDF-SHA256, no salt, info = `payment-token-v1:{device_token}`; the same
/// (BDK, device token) pair always yields the same key.
pub fn derive_device_key(bdk: &AeadKey, device_token: &str) -> Result<AeadKey, EncryptionError> {
    if device_token.is_empty() {
        return Err(EncryptionError::InvalidKeyLength);
    }
    let mut info = DEVICE_KEY_INFO_PREFIX.to_vec();
    info.extend_from_slice(device_token.as_bytes());

    let hk = Hkdf::<Sha256>::new(None, bdk.as_bytes());
    let mut derived = [0u8; 32];
    hk.expand(&info, &mut derived)
        .map_err(|_| EncryptionError::InvalidKeyLength)?;
    Ok(AeadKey::from_bytes(derived))
}
