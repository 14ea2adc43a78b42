//! FIFO message queue with message groups, dedup keys, and visibility
//! timeouts.
//!
//! Delivery semantics mirror a FIFO queue service: at-least-once delivery,
//! strict ordering within a message group (at most one in-flight message per
//! group), content-based duplicate suppression inside a dedup window, and a
//! dead-letter list for messages exceeding the max receive count.
//!
//! Two implementations: [`redis::RedisFifoQueue`] backed by Redis for
//! deployments, and [`memory::InMemoryQueue`] for tests and local runs.

#![allow(async_fn_in_trait)]

pub mod memory;
pub mod redis;

use std::time::Duration;

/// How long a dedup key suppresses duplicate sends.
pub const DEDUP_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Message to enqueue. `group_id = None` gives per-message ordering only
/// (a standard queue); with a group id, messages in the same group are
/// delivered strictly in order, one at a time.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub group_id: Option<String>,
    pub dedup_key: String,
    pub body: Vec<u8>,
}

/// Result of a send: enqueued, or suppressed by the dedup window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Enqueued,
    Duplicate,
}

/// Handle identifying one delivery, required to ack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub message_id: String,
    pub group_id: String,
}

/// A delivered message. Not acked within the visibility timeout, it becomes
/// deliverable again with an incremented `receive_count`.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub receipt: Receipt,
    pub body: Vec<u8>,
    pub receive_count: u32,
}

/// Port over the queue backend. The outbox relay sends; workers receive.
pub trait MessageQueue: Send + Sync {
    async fn send(&self, queue: &str, message: OutgoingMessage) -> Result<SendOutcome, QueueError>;

    /// Receive at most one message, waiting up to `wait` for one to arrive.
    /// The message stays invisible for `visibility`; expired in-flight
    /// messages are reclaimed before new deliveries are handed out.
    async fn receive(
        &self,
        queue: &str,
        visibility: Duration,
        wait: Duration,
    ) -> Result<Option<ReceivedMessage>, QueueError>;

    /// Delete a delivered message and release its group.
    async fn ack(&self, queue: &str, receipt: &Receipt) -> Result<(), QueueError>;

    /// Make a delivered message visible again immediately.
    async fn nack(&self, queue: &str, receipt: &Receipt) -> Result<(), QueueError>;

    /// Number of messages parked on the dead-letter list.
    async fn dead_letter_len(&self, queue: &str) -> Result<u64, QueueError>;
}
