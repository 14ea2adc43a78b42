//! Processor adapters: a uniform capability surface over concrete card
//! processors.

pub mod mock;
pub mod stripe;

use std::time::Duration;

use tably_domain::card::PaymentData;
use tably_domain::processor_config::ProcessorConfig;
use tably_domain::result::{AuthorizationResult, VoidResult};

use self::mock::MockProcessor;
use self::stripe::StripeProcessor;

/// Processor call failures. Declines are NOT errors; they come back as
/// `AuthorizationResult::Denied`.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// Timeout, rate limit, 5xx, transient network trouble. Retryable.
    #[error("transient processor error: {0}")]
    Transient(String),
    /// Broken configuration or a permanently invalid request. Not retryable.
    #[error("fatal processor error: {0}")]
    Fatal(String),
}

/// The closed processor set. One variant per concrete adapter; dispatch is a
/// match, not a vtable, because the set is part of the platform contract.
pub enum Processor {
    Mock(MockProcessor),
    Stripe(StripeProcessor),
}

impl Processor {
    pub fn from_config(
        config: &ProcessorConfig,
        statement_descriptor: Option<&str>,
        timeout: Duration,
    ) -> Self {
        match config {
            ProcessorConfig::Mock {
                default_response,
                latency_ms,
            } => Self::Mock(MockProcessor::new(default_response.clone(), *latency_ms)),
            ProcessorConfig::Stripe {
                api_key,
                statement_descriptor: config_descriptor,
                invalid_request_retryable,
                metadata,
            } => Self::Stripe(StripeProcessor::new(
                api_key.clone(),
                config_descriptor
                    .clone()
                    .or_else(|| statement_descriptor.map(str::to_owned)),
                *invalid_request_retryable,
                metadata.clone(),
                timeout,
            )),
        }
    }

    pub async fn authorize(
        &self,
        payment_data: &PaymentData,
        amount_minor: i64,
        currency: &str,
    ) -> Result<AuthorizationResult, ProcessorError> {
        match self {
            Self::Mock(processor) => processor.authorize(payment_data, amount_minor, currency).await,
            Self::Stripe(processor) => {
                processor.authorize(payment_data, amount_minor, currency).await
            }
        }
    }

    pub async fn void(
        &self,
        processor_auth_id: &str,
        reason: &str,
    ) -> Result<VoidResult, ProcessorError> {
        match self {
            Self::Mock(processor) => processor.void(processor_auth_id, reason).await,
            Self::Stripe(processor) => processor.void(processor_auth_id, reason).await,
        }
    }
}
