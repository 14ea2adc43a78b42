//! Stripe adapter over the PaymentIntents API.
//!
//! Authorization-only: intents are created with `capture_method=manual` and
//! confirmed immediately, so a successful call parks the intent in
//! `requires_capture`. Voids cancel the intent.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use tably_domain::card::PaymentData;
use tably_domain::result::{AuthorizationResult, AuthorizedResult, DeniedResult, VoidResult};

use crate::processors::ProcessorError;

const API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripeProcessor {
    http: reqwest::Client,
    api_key: String,
    statement_descriptor: Option<String>,
    /// Classification policy for ambiguous invalid-request errors.
    invalid_request_retryable: bool,
    metadata: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct PaymentIntent {
    id: String,
    status: String,
    #[serde(default)]
    latest_charge: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    error_type: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    decline_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl StripeProcessor {
    pub fn new(
        api_key: String,
        statement_descriptor: Option<String>,
        invalid_request_retryable: bool,
        metadata: BTreeMap<String, String>,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            api_key,
            statement_descriptor,
            invalid_request_retryable,
            metadata,
        }
    }

    pub async fn authorize(
        &self,
        payment_data: &PaymentData,
        amount_minor: i64,
        currency: &str,
    ) -> Result<AuthorizationResult, ProcessorError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), amount_minor.to_string()),
            ("currency".into(), currency.to_lowercase()),
            ("capture_method".into(), "manual".into()),
            ("confirm".into(), "true".into()),
            ("payment_method_data[type]".into(), "card".into()),
            (
                "payment_method_data[card][number]".into(),
                payment_data.card_number.clone(),
            ),
            (
                "payment_method_data[card][exp_month]".into(),
                payment_data.exp_month.to_string(),
            ),
            (
                "payment_method_data[card][exp_year]".into(),
                payment_data.exp_year.to_string(),
            ),
        ];
        if let Some(cvv) = &payment_data.cvv {
            form.push(("payment_method_data[card][cvc]".into(), cvv.clone()));
        }
        if let Some(descriptor) = &self.statement_descriptor {
            form.push(("statement_descriptor_suffix".into(), descriptor.clone()));
        }
        for (key, value) in &self.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        let response = self
            .http
            .post(format!("{API_BASE}/payment_intents"))
            .basic_auth(&self.api_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;

        let http_status = response.status();
        if http_status.is_success() {
            let intent: PaymentIntent = response
                .json()
                .await
                .map_err(|e| ProcessorError::Transient(format!("malformed response: {e}")))?;
            return self.classify_intent(intent, amount_minor, currency);
        }

        let body: ApiErrorBody = response.json().await.map_err(|e| {
            ProcessorError::Transient(format!("malformed error response ({http_status}): {e}"))
        })?;
        match self.classify_api_error(http_status, body.error) {
            FailureClass::Denied(denied) => {
                info!(denial_code = %denied.denial_code, "stripe card declined");
                Ok(AuthorizationResult::Denied(denied))
            }
            FailureClass::Error(error) => Err(error),
        }
    }

    pub async fn void(
        &self,
        processor_auth_id: &str,
        reason: &str,
    ) -> Result<VoidResult, ProcessorError> {
        let form = [("cancellation_reason", reason)];
        let response = self
            .http
            .post(format!("{API_BASE}/payment_intents/{processor_auth_id}/cancel"))
            .basic_auth(&self.api_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(transport_error)?;

        let http_status = response.status();
        if http_status.is_success() {
            let intent: PaymentIntent = response
                .json()
                .await
                .map_err(|e| ProcessorError::Transient(format!("malformed response: {e}")))?;
            info!(processor_auth_id = %intent.id, "stripe authorization canceled");
            return Ok(VoidResult {
                processor_name: "stripe".to_owned(),
                processor_void_id: intent.id,
                voided_at: Utc::now(),
            });
        }

        let body: ApiErrorBody = response.json().await.map_err(|e| {
            ProcessorError::Transient(format!("malformed error response ({http_status}): {e}"))
        })?;
        match self.classify_api_error(http_status, body.error) {
            // A card error on a cancel call means the intent cannot be
            // voided; that is permanent.
            FailureClass::Denied(denied) => Err(ProcessorError::Fatal(format!(
                "stripe refused void: {}",
                denied.denial_reason
            ))),
            FailureClass::Error(error) => Err(error),
        }
    }

    fn classify_intent(
        &self,
        intent: PaymentIntent,
        amount_minor: i64,
        currency: &str,
    ) -> Result<AuthorizationResult, ProcessorError> {
        match intent.status.as_str() {
            "requires_capture" => {
                info!(processor_auth_id = %intent.id, "stripe authorization succeeded");
                Ok(AuthorizationResult::Authorized(AuthorizedResult {
                    processor_name: "stripe".to_owned(),
                    authorization_code: intent.latest_charge.unwrap_or_default(),
                    processor_auth_id: intent.id,
                    authorized_amount_minor: amount_minor,
                    currency: currency.to_uppercase(),
                    authorized_at: Utc::now(),
                    processor_metadata: [("status".to_owned(), "requires_capture".to_owned())]
                        .into(),
                }))
            }
            // 3-D Secure challenges cannot be completed from a worker; the
            // request is denied, not retried.
            "requires_action" => Ok(AuthorizationResult::Denied(DeniedResult {
                processor_name: "stripe".to_owned(),
                denial_code: "requires_action".to_owned(),
                denial_reason: "Payment requires additional authentication".to_owned(),
                processor_metadata: [("payment_intent_id".to_owned(), intent.id)].into(),
            })),
            other => Err(ProcessorError::Fatal(format!(
                "unexpected payment intent status: {other}"
            ))),
        }
    }

    fn classify_api_error(&self, http_status: reqwest::StatusCode, error: ApiError) -> FailureClass {
        if http_status.as_u16() == 429 || error.error_type == "rate_limit_error" {
            warn!("stripe rate limit");
            return FailureClass::Error(ProcessorError::Transient(
                "stripe rate limit exceeded".to_owned(),
            ));
        }
        match error.error_type.as_str() {
            // A decline is a business outcome reported on the error channel.
            "card_error" => FailureClass::Denied(DeniedResult {
                processor_name: "stripe".to_owned(),
                denial_code: error
                    .decline_code
                    .or(error.code)
                    .unwrap_or_else(|| "card_declined".to_owned()),
                denial_reason: error
                    .message
                    .unwrap_or_else(|| "Card was declined".to_owned()),
                processor_metadata: Default::default(),
            }),
            "invalid_request_error" if self.invalid_request_retryable => {
                FailureClass::Error(ProcessorError::Transient(format!(
                    "stripe invalid request: {}",
                    error.message.unwrap_or_default()
                )))
            }
            "invalid_request_error" => FailureClass::Error(ProcessorError::Fatal(format!(
                "stripe invalid request: {}",
                error.message.unwrap_or_default()
            ))),
            _ if http_status.is_server_error() || error.error_type == "api_error" => {
                FailureClass::Error(ProcessorError::Transient(format!(
                    "stripe api error: {}",
                    error.message.unwrap_or_default()
                )))
            }
            other => FailureClass::Error(ProcessorError::Fatal(format!(
                "stripe error {other}: {}",
                error.message.unwrap_or_default()
            ))),
        }
    }
}

enum FailureClass {
    Denied(DeniedResult),
    Error(ProcessorError),
}

fn transport_error(error: reqwest::Error) -> ProcessorError {
    if error.is_timeout() || error.is_connect() {
        ProcessorError::Transient(format!("stripe unreachable: {error}"))
    } else {
        ProcessorError::Transient(format!("stripe transport error: {error}"))
    }
}
