//! Deterministic mock processor.
//!
//! Maps the well-known test PANs to fixed outcomes so end-to-end flows run
//! with no external dependency. Response shapes are structurally identical
//! to the real processors'.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use tably_domain::card::{PaymentData, card_brand};
use tably_domain::result::{AuthorizationResult, AuthorizedResult, DeniedResult, VoidResult};

use crate::processors::ProcessorError;

/// Times out on the first attempt per process, then authorizes: exercises the
/// redeliver-and-succeed path.
pub const PAN_TIMEOUT_ONCE: &str = "4000000000000119";
/// Always rate-limited: exercises the retries-exhausted path.
pub const PAN_RATE_LIMITED: &str = "4000000000009987";

enum Behavior {
    Success {
        auth_code: &'static str,
    },
    Decline {
        code: &'static str,
        reason: &'static str,
    },
    TimeoutOnce,
    RateLimit,
    RequiresAction,
}

fn behavior_for(pan: &str) -> Option<Behavior> {
    match pan {
        "4242424242424242" => Some(Behavior::Success { auth_code: "123456" }),
        "5555555555554444" => Some(Behavior::Success { auth_code: "789012" }),
        "378282246310005" => Some(Behavior::Success { auth_code: "345678" }),
        "4000000000000002" => Some(Behavior::Decline {
            code: "generic_decline",
            reason: "Your card was declined",
        }),
        "4000000000009995" => Some(Behavior::Decline {
            code: "insufficient_funds",
            reason: "Your card has insufficient funds",
        }),
        "4000000000000069" => Some(Behavior::Decline {
            code: "expired_card",
            reason: "Your card has expired",
        }),
        "4000000000000127" => Some(Behavior::Decline {
            code: "incorrect_cvc",
            reason: "Your card's security code is incorrect",
        }),
        "4000000000000341" => Some(Behavior::Decline {
            code: "lost_card",
            reason: "Your card has been declined",
        }),
        "4000000000000226" => Some(Behavior::Decline {
            code: "fraudulent",
            reason: "Your card has been declined",
        }),
        PAN_TIMEOUT_ONCE => Some(Behavior::TimeoutOnce),
        PAN_RATE_LIMITED => Some(Behavior::RateLimit),
        "4000002500003155" => Some(Behavior::RequiresAction),
        _ => None,
    }
}

// Attempt counter for the timeout-once PAN. Process-wide on purpose: the
// worker builds a fresh adapter per message, and redelivery lands in the
// same process only by way of this counter.
static TIMEOUT_ATTEMPTS: LazyLock<Mutex<HashMap<String, u32>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub struct MockProcessor {
    default_response: String,
    latency: Duration,
}

impl MockProcessor {
    pub fn new(default_response: String, latency_ms: u64) -> Self {
        Self {
            default_response,
            latency: Duration::from_millis(latency_ms),
        }
    }

    pub async fn authorize(
        &self,
        payment_data: &PaymentData,
        amount_minor: i64,
        currency: &str,
    ) -> Result<AuthorizationResult, ProcessorError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let pan = payment_data.card_number.as_str();
        let last4 = payment_data.last4();

        match behavior_for(pan) {
            Some(Behavior::Success { auth_code }) => {
                Ok(self.authorized(pan, &last4, auth_code.to_owned(), amount_minor, currency))
            }
            Some(Behavior::Decline { code, reason }) => {
                info!(card_last_four = %last4, denial_code = code, "mock card declined");
                Ok(AuthorizationResult::Denied(DeniedResult {
                    processor_name: "mock".to_owned(),
                    denial_code: code.to_owned(),
                    denial_reason: reason.to_owned(),
                    processor_metadata: [("test_card_last4".to_owned(), last4)].into(),
                }))
            }
            Some(Behavior::TimeoutOnce) => {
                let attempt = {
                    let mut attempts = TIMEOUT_ATTEMPTS.lock().unwrap();
                    let count = attempts.entry(pan.to_owned()).or_insert(0);
                    *count += 1;
                    *count
                };
                if attempt == 1 {
                    warn!(card_last_four = %last4, "mock processor timeout");
                    Err(ProcessorError::Transient(
                        "mock processor timeout".to_owned(),
                    ))
                } else {
                    Ok(self.authorized(pan, &last4, random_auth_code(), amount_minor, currency))
                }
            }
            Some(Behavior::RateLimit) => {
                warn!(card_last_four = %last4, "mock processor rate limited");
                Err(ProcessorError::Transient(
                    "mock processor rate limit exceeded".to_owned(),
                ))
            }
            Some(Behavior::RequiresAction) => Ok(AuthorizationResult::Denied(DeniedResult {
                processor_name: "mock".to_owned(),
                denial_code: "requires_action".to_owned(),
                denial_reason: "Payment requires additional authentication".to_owned(),
                processor_metadata: [("status".to_owned(), "requires_action".to_owned())].into(),
            })),
            None => {
                if self.default_response == "declined" {
                    Ok(AuthorizationResult::Denied(DeniedResult {
                        processor_name: "mock".to_owned(),
                        denial_code: "generic_decline".to_owned(),
                        denial_reason: "Your card was declined".to_owned(),
                        processor_metadata: Default::default(),
                    }))
                } else {
                    Ok(self.authorized(pan, &last4, random_auth_code(), amount_minor, currency))
                }
            }
        }
    }

    pub async fn void(
        &self,
        processor_auth_id: &str,
        _reason: &str,
    ) -> Result<VoidResult, ProcessorError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        info!(processor_auth_id, "mock authorization voided");
        Ok(VoidResult {
            processor_name: "mock".to_owned(),
            processor_void_id: format!("mock_vd_{}", &Uuid::new_v4().simple().to_string()[..24]),
            voided_at: Utc::now(),
        })
    }

    fn authorized(
        &self,
        pan: &str,
        last4: &str,
        auth_code: String,
        amount_minor: i64,
        currency: &str,
    ) -> AuthorizationResult {
        let intent_id = format!("mock_pi_{}", &Uuid::new_v4().simple().to_string()[..24]);
        info!(
            processor_auth_id = %intent_id,
            amount_minor,
            card_last_four = %last4,
            "mock authorization success"
        );
        AuthorizationResult::Authorized(AuthorizedResult {
            processor_name: "mock".to_owned(),
            processor_auth_id: intent_id,
            authorization_code: auth_code,
            authorized_amount_minor: amount_minor,
            currency: currency.to_uppercase(),
            authorized_at: Utc::now(),
            processor_metadata: [
                // Mirrors the real processor's auth-only status.
                ("status".to_owned(), "requires_capture".to_owned()),
                ("card_brand".to_owned(), card_brand(pan).to_owned()),
                ("card_last4".to_owned(), last4.to_owned()),
            ]
            .into(),
        })
    }
}

fn random_auth_code() -> String {
    format!("{:06}", Uuid::new_v4().as_u128() % 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(pan: &str) -> PaymentData {
        PaymentData {
            card_number: pan.to_owned(),
            exp_month: 12,
            exp_year: 2030,
            cvv: Some("123".into()),
            cardholder_name: None,
            billing_zip: None,
        }
    }

    fn mock() -> MockProcessor {
        MockProcessor::new("authorized".into(), 0)
    }

    #[tokio::test]
    async fn should_authorize_success_pan_with_fixed_auth_code() {
        let result = mock()
            .authorize(&card("4242424242424242"), 5000, "USD")
            .await
            .unwrap();
        match result {
            AuthorizationResult::Authorized(r) => {
                assert_eq!(r.processor_name, "mock");
                assert_eq!(r.authorization_code, "123456");
                assert_eq!(r.authorized_amount_minor, 5000);
                assert_eq!(r.currency, "USD");
                assert!(r.processor_auth_id.starts_with("mock_pi_"));
            }
            other => panic!("expected authorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_decline_insufficient_funds_pan() {
        let result = mock()
            .authorize(&card("4000000000009995"), 5000, "USD")
            .await
            .unwrap();
        match result {
            AuthorizationResult::Denied(r) => {
                assert_eq!(r.denial_code, "insufficient_funds");
            }
            other => panic!("expected denied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_rate_limit_as_transient_error() {
        let result = mock().authorize(&card(PAN_RATE_LIMITED), 5000, "USD").await;
        assert!(matches!(result, Err(ProcessorError::Transient(_))));
    }

    #[tokio::test]
    async fn should_map_requires_action_to_denied() {
        let result = mock()
            .authorize(&card("4000002500003155"), 5000, "USD")
            .await
            .unwrap();
        match result {
            AuthorizationResult::Denied(r) => assert_eq!(r.denial_code, "requires_action"),
            other => panic!("expected denied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_authorize_unknown_pan_by_default_and_decline_when_configured() {
        let result = mock()
            .authorize(&card("4111111111111111"), 1000, "USD")
            .await
            .unwrap();
        assert!(result.is_authorized());

        let declining = MockProcessor::new("declined".into(), 0);
        let result = declining
            .authorize(&card("4111111111111111"), 1000, "USD")
            .await
            .unwrap();
        assert!(!result.is_authorized());
    }

    #[tokio::test]
    async fn should_void_with_mock_void_id() {
        let result = mock().void("mock_pi_abc", "customer_request").await.unwrap();
        assert!(result.processor_void_id.starts_with("mock_vd_"));
    }
}
