use serde::Deserialize;

use tably_core::config::Config;

fn default_auth_port() -> u16 {
    3310
}

fn default_fast_path_wait_ms() -> u64 {
    5000
}

fn default_fast_path_poll_interval_ms() -> u64 {
    100
}

fn default_outbox_interval_ms() -> u64 {
    500
}

fn default_outbox_batch_size() -> u64 {
    50
}

fn default_auth_queue() -> String {
    "payment-auth-requests.fifo".to_owned()
}

fn default_void_queue() -> String {
    "payment-void-requests".to_owned()
}

fn default_idempotency_ttl_hours() -> u32 {
    24
}

/// Authorization service configuration loaded from environment variables.
#[derive(Debug, Deserialize)]
pub struct AuthorizationConfig {
    /// PostgreSQL connection URL for the payments database.
    pub database_url: String,
    /// Redis connection URL backing the message queue.
    pub redis_url: String,
    /// API key required from clients; unset disables the check (local runs).
    pub api_key: Option<String>,
    /// TCP port to listen on (default 3310). Env var: `AUTH_PORT`.
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,
    /// Bound on the synchronous fast-path wait. Env var: `FAST_PATH_WAIT_MS`.
    #[serde(default = "default_fast_path_wait_ms")]
    pub fast_path_wait_ms: u64,
    #[serde(default = "default_fast_path_poll_interval_ms")]
    pub fast_path_poll_interval_ms: u64,
    #[serde(default = "default_outbox_interval_ms")]
    pub outbox_interval_ms: u64,
    #[serde(default = "default_outbox_batch_size")]
    pub outbox_batch_size: u64,
    #[serde(default = "default_auth_queue")]
    pub auth_queue: String,
    #[serde(default = "default_void_queue")]
    pub void_queue: String,
    /// Retention of idempotency bindings; at least the token TTL.
    #[serde(default = "default_idempotency_ttl_hours")]
    pub idempotency_ttl_hours: u32,
}

impl Config for AuthorizationConfig {}
