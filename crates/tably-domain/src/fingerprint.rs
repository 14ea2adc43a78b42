//! Request fingerprints for idempotency conflict detection.

use sha2::{Digest, Sha256};

/// SHA-256 over the semantic fields of a request, hex-encoded. A replayed
/// idempotency key with a different fingerprint is a client conflict, not a
/// replay.
pub fn fingerprint(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]); // unit separator, avoids ambiguous joins
        }
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}
