//! Per-restaurant payment processor configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Processor selection plus processor-specific settings, stored as a tagged
/// JSON document on `restaurant_payment_configs`. The processor set is
/// closed; adding a processor means adding a variant here and an adapter in
/// the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "processor", rename_all = "snake_case")]
pub enum ProcessorConfig {
    Mock {
        /// Behavior for PANs outside the test table: "authorized" or "declined".
        #[serde(default = "default_mock_response")]
        default_response: String,
        /// Simulated processing latency.
        #[serde(default)]
        latency_ms: u64,
    },
    Stripe {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        statement_descriptor: Option<String>,
        /// Whether ambiguous invalid-request errors are treated as transient.
        #[serde(default = "default_invalid_request_retryable")]
        invalid_request_retryable: bool,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        metadata: BTreeMap<String, String>,
    },
}

fn default_mock_response() -> String {
    "authorized".to_owned()
}

fn default_invalid_request_retryable() -> bool {
    true
}

impl ProcessorConfig {
    pub fn processor_name(&self) -> &'static str {
        match self {
            Self::Mock { .. } => "mock",
            Self::Stripe { .. } => "stripe",
        }
    }
}

/// The restaurant's payment configuration row as the worker consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantPaymentConfig {
    pub restaurant_id: uuid::Uuid,
    pub config: ProcessorConfig,
    /// Version stamp recorded on `AuthAttemptStarted` events.
    pub config_version: String,
    pub statement_descriptor: Option<String>,
}
