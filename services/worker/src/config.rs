use serde::Deserialize;
use uuid::Uuid;

use tably_core::config::Config;

fn default_max_retries() -> u32 {
    5
}

fn default_lock_ttl_seconds() -> u64 {
    30
}

fn default_processor_timeout_ms() -> u64 {
    10_000
}

// Visibility must exceed lock TTL + processor timeout so a crashed worker's
// message resurfaces only after its lock has expired.
fn default_visibility_timeout_seconds() -> u64 {
    45
}

fn default_queue_wait_seconds() -> u64 {
    20
}

fn default_concurrency() -> usize {
    4
}

fn default_lock_cleanup_interval_seconds() -> u64 {
    30
}

fn default_auth_queue() -> String {
    "payment-auth-requests.fifo".to_owned()
}

fn default_void_queue() -> String {
    "payment-void-requests".to_owned()
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Deserialize)]
pub struct WorkerConfig {
    /// PostgreSQL connection URL for the payments database.
    pub database_url: String,
    /// Redis connection URL backing the message queue.
    pub redis_url: String,
    /// Payment token service gRPC URL (e.g. "http://payment-token:50061").
    pub token_grpc_url: String,
    /// Secret bound into the worker's `service:{name}:{secret}` decrypt
    /// credential.
    pub service_auth_token: String,
    /// Stable worker identity; generated per process when unset.
    pub worker_id: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_lock_ttl_seconds")]
    pub lock_ttl_seconds: u64,
    #[serde(default = "default_processor_timeout_ms")]
    pub processor_timeout_ms: u64,
    #[serde(default = "default_visibility_timeout_seconds")]
    pub visibility_timeout_seconds: u64,
    #[serde(default = "default_queue_wait_seconds")]
    pub queue_wait_seconds: u64,
    /// Parallel consumers per process.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_lock_cleanup_interval_seconds")]
    pub lock_cleanup_interval_seconds: u64,
    #[serde(default = "default_auth_queue")]
    pub auth_queue: String,
    #[serde(default = "default_void_queue")]
    pub void_queue: String,
}

impl Config for WorkerConfig {}

impl WorkerConfig {
    pub fn worker_id(&self) -> String {
        self.worker_id
            .clone()
            .unwrap_or_else(|| format!("worker-{}", Uuid::new_v4().simple()))
    }
}
