//! Distributed processing locks over `auth_processing_locks`.
//!
//! Acquisition is one atomic upsert: insert the row, or take over an
//! existing row whose TTL has passed. Release is fenced by holder id, so a
//! worker that lost its lock to a takeover cannot release the new holder's.

use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Statement, Value,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tably_payments_schema::auth_processing_locks;

use crate::domain::repository::LockManager;

const ACQUIRE_SQL: &str = r#"
INSERT INTO auth_processing_locks (auth_request_id, worker_id, acquired_at, expires_at)
VALUES ($1, $2, $3, $4)
ON CONFLICT (auth_request_id) DO UPDATE
SET worker_id = EXCLUDED.worker_id,
    acquired_at = EXCLUDED.acquired_at,
    expires_at = EXCLUDED.expires_at
WHERE auth_processing_locks.expires_at <= $3
RETURNING worker_id
"#;

const RENEW_SQL: &str = r#"
UPDATE auth_processing_locks
SET expires_at = $3
WHERE auth_request_id = $1 AND worker_id = $2
RETURNING worker_id
"#;

#[derive(Clone)]
pub struct DbLockManager {
    pub db: DatabaseConnection,
}

impl LockManager for DbLockManager {
    async fn acquire(
        &self,
        auth_request_id: Uuid,
        worker_id: &str,
        ttl: Duration,
    ) -> Result<bool, anyhow::Error> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(ttl).context("lock ttl")?;
        let result = self
            .db
            .query_one(Statement::from_sql_and_values(
                self.db.get_database_backend(),
                ACQUIRE_SQL,
                [
                    Value::from(auth_request_id),
                    Value::from(worker_id),
                    Value::from(now),
                    Value::from(expires_at),
                ],
            ))
            .await
            .context("acquire processing lock")?;

        let acquired = result.is_some();
        if acquired {
            info!(
                auth_request_id = %auth_request_id,
                worker_id,
                ttl_seconds = ttl.as_secs(),
                "lock acquired"
            );
        } else {
            debug!(auth_request_id = %auth_request_id, worker_id, "lock already held");
        }
        Ok(acquired)
    }

    async fn renew(
        &self,
        auth_request_id: Uuid,
        worker_id: &str,
        ttl: Duration,
    ) -> Result<bool, anyhow::Error> {
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).context("lock ttl")?;
        let result = self
            .db
            .query_one(Statement::from_sql_and_values(
                self.db.get_database_backend(),
                RENEW_SQL,
                [
                    Value::from(auth_request_id),
                    Value::from(worker_id),
                    Value::from(expires_at),
                ],
            ))
            .await
            .context("renew processing lock")?;
        Ok(result.is_some())
    }

    async fn release(&self, auth_request_id: Uuid, worker_id: &str) -> Result<(), anyhow::Error> {
        let result = auth_processing_locks::Entity::delete_many()
            .filter(auth_processing_locks::Column::AuthRequestId.eq(auth_request_id))
            .filter(auth_processing_locks::Column::WorkerId.eq(worker_id))
            .exec(&self.db)
            .await
            .context("release processing lock")?;

        if result.rows_affected > 0 {
            info!(auth_request_id = %auth_request_id, worker_id, "lock released");
        } else {
            // Either expired and taken over, or already released.
            warn!(auth_request_id = %auth_request_id, worker_id, "lock not held on release");
        }
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<u64, anyhow::Error> {
        let result = auth_processing_locks::Entity::delete_many()
            .filter(auth_processing_locks::Column::ExpiresAt.lt(Utc::now()))
            .exec(&self.db)
            .await
            .context("cleanup expired locks")?;
        if result.rows_affected > 0 {
            info!(count = result.rows_affected, "expired locks cleaned");
        }
        Ok(result.rows_affected)
    }
}
