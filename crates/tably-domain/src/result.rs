//! Processor outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A successful (approved) authorization as reported by a processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizedResult {
    pub processor_name: String,
    pub processor_auth_id: String,
    pub authorization_code: String,
    pub authorized_amount_minor: i64,
    pub currency: String,
    pub authorized_at: DateTime<Utc>,
    #[serde(default)]
    pub processor_metadata: BTreeMap<String, String>,
}

/// A declined authorization. A decline is a normal business outcome, not an
/// error, and is never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeniedResult {
    pub processor_name: String,
    pub denial_code: String,
    pub denial_reason: String,
    #[serde(default)]
    pub processor_metadata: BTreeMap<String, String>,
}

/// Terminal outcome of one processor `authorize` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationResult {
    Authorized(AuthorizedResult),
    Denied(DeniedResult),
}

impl AuthorizationResult {
    pub fn processor_name(&self) -> &str {
        match self {
            Self::Authorized(r) => &r.processor_name,
            Self::Denied(r) => &r.processor_name,
        }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }
}

/// Outcome of a processor `void` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidResult {
    pub processor_name: String,
    pub processor_void_id: String,
    pub voided_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_tag_result_variants_by_status() {
        let denied = AuthorizationResult::Denied(DeniedResult {
            processor_name: "mock".into(),
            denial_code: "insufficient_funds".into(),
            denial_reason: "Your card has insufficient funds".into(),
            processor_metadata: BTreeMap::new(),
        });
        let json = serde_json::to_value(&denied).unwrap();
        assert_eq!(json["status"], "DENIED");
        assert_eq!(json["denial_code"], "insufficient_funds");
    }
}
