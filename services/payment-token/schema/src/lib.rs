//! Sea-ORM entities for the token database.
//!
//! Lives in its own database to keep PCI scope small; nothing in here ever
//! stores a plaintext PAN.

pub mod decrypt_audit_log;
pub mod encryption_keys;
pub mod payment_tokens;
pub mod token_idempotency_keys;
