//! Outbox relay: drains committed outbox rows into the message queue.
//!
//! Runs on a short fixed interval and on an in-process wakeup after any
//! outbox insert. A crash between publish and mark-processed causes a
//! republish, which the queue's dedup key (the outbox row id) suppresses;
//! the worker is idempotent besides.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng as _;
use tokio::sync::{Notify, watch};
use tracing::{error, info, warn};

use tably_queue::{MessageQueue, OutgoingMessage};

use crate::domain::repository::OutboxStore;

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);

pub struct OutboxRelay<S: OutboxStore, Q: MessageQueue> {
    pub store: S,
    pub queue: Q,
    pub interval: Duration,
    pub batch_size: u64,
    pub wakeup: Arc<Notify>,
}

impl<S: OutboxStore, Q: MessageQueue> OutboxRelay<S, Q> {
    /// Run until `shutdown` flips to true. Spawn with `tokio::spawn`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            batch_size = self.batch_size,
            "outbox relay started"
        );
        loop {
            tokio::select! {
                _ = self.wakeup.notified() => {}
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("outbox relay stopped");
                        return;
                    }
                }
            }
            if let Err(e) = self.drain().await {
                error!(error = %e, "outbox relay pass failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    /// Publish every due row, oldest first. Returns the number delivered.
    pub async fn drain(&self) -> Result<u64, anyhow::Error> {
        let mut delivered = 0u64;
        loop {
            let rows = self.store.fetch_due(self.batch_size).await?;
            let batch_len = rows.len() as u64;

            for row in rows {
                let send = self
                    .queue
                    .send(
                        &row.destination,
                        OutgoingMessage {
                            group_id: row.message_group.clone(),
                            dedup_key: row.id.to_string(),
                            body: row.payload.clone(),
                        },
                    )
                    .await;

                match send {
                    Ok(_) => {
                        // Duplicate outcomes also count as delivered: the
                        // queue already holds a message with our dedup key.
                        self.store.mark_processed(row.id).await?;
                        delivered += 1;
                    }
                    Err(e) => {
                        let next_attempt_at =
                            Utc::now() + backoff_with_jitter(row.attempts + 1);
                        warn!(
                            outbox_id = %row.id,
                            destination = %row.destination,
                            attempts = row.attempts + 1,
                            error = %e,
                            "outbox publish failed, backing off"
                        );
                        self.store
                            .mark_failed(row.id, &e.to_string(), next_attempt_at)
                            .await?;
                    }
                }
            }

            if batch_len < self.batch_size {
                return Ok(delivered);
            }
        }
    }
}

/// Exponential backoff with full jitter, capped.
fn backoff_with_jitter(attempt: i32) -> chrono::Duration {
    let exp = attempt.clamp(1, 16) as u32 - 1;
    let ceiling = BACKOFF_BASE
        .saturating_mul(2u32.saturating_pow(exp))
        .min(BACKOFF_CAP);
    let jittered = rand::thread_rng().gen_range(0..=ceiling.as_millis() as u64);
    chrono::Duration::milliseconds(jittered.max(100) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_cap_backoff_at_sixty_seconds() {
        for attempt in 1..=20 {
            let backoff = backoff_with_jitter(attempt);
            assert!(backoff <= chrono::Duration::seconds(60));
            assert!(backoff >= chrono::Duration::milliseconds(100));
        }
    }
}
