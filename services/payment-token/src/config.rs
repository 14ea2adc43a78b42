use serde::Deserialize;

use tably_core::config::Config;

fn default_token_port() -> u16 {
    3320
}

fn default_grpc_port() -> u16 {
    50061
}

fn default_token_ttl_hours() -> u32 {
    24
}

fn default_current_key_version() -> String {
    "v1".to_owned()
}

fn default_allowed_services() -> String {
    "auth-processor-worker,void-processor-worker".to_owned()
}

/// Token service configuration loaded from environment variables.
#[derive(Debug, Deserialize)]
pub struct TokenConfig {
    /// PostgreSQL connection URL for the token database (separate from the
    /// payments database to keep PCI scope small). Env var: `DATABASE_URL`.
    pub database_url: String,
    /// API key required from clients on `POST /v1/payment-tokens`.
    pub api_key: String,
    /// Secret internal callers bind into their `service:{name}:{secret}`
    /// decrypt credential; the service name half is what the allow-list
    /// checks.
    pub service_auth_token: String,
    /// Comma-separated service names allowed to decrypt tokens.
    #[serde(default = "default_allowed_services")]
    pub allowed_services: String,
    /// Hex-encoded 32-byte AEAD key backing the development `primary` key id.
    /// Production deployments resolve named keys from a managed secret store
    /// instead and leave this unset.
    pub primary_encryption_key: Option<String>,
    /// Hex-encoded 32-byte base derivation key for the device-token flow.
    pub base_derivation_key: Option<String>,
    /// Service-key version newly created tokens are encrypted under.
    #[serde(default = "default_current_key_version")]
    pub current_key_version: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u32,
    /// HTTP port. Env var: `TOKEN_PORT`.
    #[serde(default = "default_token_port")]
    pub token_port: u16,
    /// gRPC port for the internal decrypt surface. Env var: `GRPC_PORT`.
    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,
}

impl Config for TokenConfig {}

impl TokenConfig {
    pub fn allowed_services(&self) -> Vec<String> {
        self.allowed_services
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
