use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::sync::Notify;

use tably_core::waiters::WaiterRegistry;

use crate::domain::types::AuthRequestSnapshot;
use crate::infra::db::{DbAuthRequestRepository, DbOutboxStore};

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub api_key: Option<Arc<str>>,
    /// Fast-path waiter registry; signaled by a same-process worker.
    pub waiters: Arc<WaiterRegistry<AuthRequestSnapshot>>,
    /// Woken by repository commits that inserted outbox rows.
    pub relay_wakeup: Arc<Notify>,
    pub fast_path_wait: Duration,
    pub fast_path_poll_interval: Duration,
    pub auth_queue: String,
    pub void_queue: String,
    pub idempotency_ttl_hours: u32,
}

impl AppState {
    pub fn auth_repo(&self) -> DbAuthRequestRepository {
        DbAuthRequestRepository {
            db: self.db.clone(),
            auth_queue: self.auth_queue.clone(),
            void_queue: self.void_queue.clone(),
            idempotency_ttl_hours: self.idempotency_ttl_hours,
            relay_wakeup: self.relay_wakeup.clone(),
        }
    }

    pub fn outbox_store(&self) -> DbOutboxStore {
        DbOutboxStore {
            db: self.db.clone(),
        }
    }
}
