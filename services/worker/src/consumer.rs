//! Queue consumer loops.
//!
//! Long-polls the FIFO auth queue and the standard void queue, hands each
//! delivery to the processor, and acks according to the outcome. Retryable
//! outcomes leave the message invisible until the visibility timeout
//! redelivers it; lock contention does the same so the holding worker can
//! finish.

use std::time::Duration;

use prost::Message as _;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use tably_proto::payments::v1::{AuthRequestQueuedMessage, VoidRequestQueuedMessage};
use tably_queue::{MessageQueue, ReceivedMessage};

use crate::domain::repository::{LockManager, PaymentStore, TokenDecryptor};
use crate::domain::types::ProcessingOutcome;
use crate::processor::AuthRequestProcessor;

pub struct WorkerConsumer<Q, S, L, T>
where
    Q: MessageQueue,
    S: PaymentStore,
    L: LockManager,
    T: TokenDecryptor,
{
    pub queue: Q,
    pub processor: AuthRequestProcessor<S, L, T>,
    pub auth_queue: String,
    pub void_queue: String,
    pub visibility: Duration,
    pub queue_wait: Duration,
}

impl<Q, S, L, T> WorkerConsumer<Q, S, L, T>
where
    Q: MessageQueue,
    S: PaymentStore,
    L: LockManager,
    T: TokenDecryptor,
{
    /// Consume the auth queue until shutdown. In-flight work finishes; a
    /// receive cancelled mid-claim resurfaces after its visibility timeout.
    pub async fn run_auth_loop(&self, mut shutdown: watch::Receiver<bool>) {
        info!(queue = %self.auth_queue, "auth consumer started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(queue = %self.auth_queue, "auth consumer stopped");
                        return;
                    }
                }
                received = self.queue.receive(&self.auth_queue, self.visibility, self.queue_wait) => {
                    match received {
                        Ok(Some(message)) => self.handle_auth_message(message).await,
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "auth queue receive failed");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }
    }

    pub async fn run_void_loop(&self, mut shutdown: watch::Receiver<bool>) {
        info!(queue = %self.void_queue, "void consumer started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(queue = %self.void_queue, "void consumer stopped");
                        return;
                    }
                }
                received = self.queue.receive(&self.void_queue, self.visibility, self.queue_wait) => {
                    match received {
                        Ok(Some(message)) => self.handle_void_message(message).await,
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "void queue receive failed");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle_auth_message(&self, message: ReceivedMessage) {
        let Some(auth_request_id) = decode_auth_message(&message) else {
            // Undecodable messages can never succeed; drop them.
            error!(message_id = %message.receipt.message_id, "dropping undecodable auth message");
            self.ack(&self.auth_queue, &message).await;
            return;
        };

        match self
            .processor
            .process_auth_request(auth_request_id, message.receive_count)
            .await
        {
            Ok(outcome) => {
                if should_ack(outcome) {
                    self.ack(&self.auth_queue, &message).await;
                }
            }
            Err(e) => {
                // Infrastructure trouble: leave the message for redelivery.
                error!(auth_request_id = %auth_request_id, error = %e, "auth processing errored");
            }
        }
    }

    async fn handle_void_message(&self, message: ReceivedMessage) {
        let Some(auth_request_id) = decode_void_message(&message) else {
            error!(message_id = %message.receipt.message_id, "dropping undecodable void message");
            self.ack(&self.void_queue, &message).await;
            return;
        };

        match self
            .processor
            .process_void_request(auth_request_id, message.receive_count)
            .await
        {
            Ok(outcome) => {
                if should_ack(outcome) {
                    self.ack(&self.void_queue, &message).await;
                }
            }
            Err(e) => {
                error!(auth_request_id = %auth_request_id, error = %e, "void processing errored");
            }
        }
    }

    async fn ack(&self, queue: &str, message: &ReceivedMessage) {
        if let Err(e) = self.queue.ack(queue, &message.receipt).await {
            // The visibility timeout will redeliver; the terminal state
            // check discards the duplicate.
            warn!(message_id = %message.receipt.message_id, error = %e, "ack failed");
        }
    }
}

fn should_ack(outcome: ProcessingOutcome) -> bool {
    match outcome {
        ProcessingOutcome::Completed
        | ProcessingOutcome::SkippedVoidDetected
        | ProcessingOutcome::SkippedAlreadyTerminal
        | ProcessingOutcome::TerminalFailure => true,
        ProcessingOutcome::RetryLater | ProcessingOutcome::SkippedLockHeld => false,
    }
}

fn decode_auth_message(message: &ReceivedMessage) -> Option<Uuid> {
    let decoded = AuthRequestQueuedMessage::decode(message.body.as_slice()).ok()?;
    decoded.auth_request_id.parse().ok()
}

fn decode_void_message(message: &ReceivedMessage) -> Option<Uuid> {
    let decoded = VoidRequestQueuedMessage::decode(message.body.as_slice()).ok()?;
    decoded.auth_request_id.parse().ok()
}

/// Periodic sweep deleting expired lock rows.
pub async fn run_lock_cleanup<L: LockManager>(
    locks: L,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_seconds = interval.as_secs(), "lock cleanup task started");
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("lock cleanup task stopped");
                    return;
                }
            }
            _ = tokio::time::sleep(interval) => {
                if let Err(e) = locks.cleanup_expired().await {
                    error!(error = %e, "lock cleanup failed");
                }
            }
        }
    }
}
