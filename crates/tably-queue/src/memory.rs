//! In-memory queue for tests and single-process runs.
//!
//! Implements the same delivery semantics as the Redis backend: per-group
//! FIFO with one in-flight message per group, dedup window, visibility
//! timeouts, receive counts, and a dead-letter list.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    MessageQueue, OutgoingMessage, QueueError, ReceivedMessage, Receipt, SendOutcome,
};

const DEFAULT_MAX_RECEIVE_COUNT: u32 = 6;

struct StoredMessage {
    id: String,
    body: Vec<u8>,
    receive_count: u32,
}

#[derive(Default)]
struct QueueState {
    /// Groups with a deliverable head message, oldest claim first.
    ready: VecDeque<String>,
    /// Per-group FIFO of pending messages.
    groups: HashMap<String, VecDeque<StoredMessage>>,
    /// Groups with an in-flight delivery.
    inflight_groups: HashSet<String>,
    /// message id -> visibility deadline.
    inflight: HashMap<String, Instant>,
    /// dedup key -> expiry.
    dedup: HashMap<String, Instant>,
    dead_letters: Vec<StoredMessage>,
}

impl QueueState {
    fn reclaim_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .inflight
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            self.inflight.remove(&id);
            if let Some(group) = self
                .groups
                .iter()
                .find(|(_, msgs)| msgs.front().is_some_and(|m| m.id == id))
                .map(|(g, _)| g.clone())
            {
                self.inflight_groups.remove(&group);
                self.ready.push_back(group);
            }
        }
        self.dedup.retain(|_, expiry| *expiry > now);
    }
}

/// In-memory [`MessageQueue`]. All state lives under one mutex; share it
/// behind a reference or an `Arc`.
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
    max_receive_count: u32,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
        }
    }

    pub fn with_max_receive_count(mut self, max_receive_count: u32) -> Self {
        self.max_receive_count = max_receive_count;
        self
    }

    /// Pending (not in-flight, not dead-lettered) message count, for tests.
    pub fn pending_len(&self, queue: &str) -> usize {
        let queues = self.queues.lock().unwrap();
        queues
            .get(queue)
            .map(|q| q.groups.values().map(|g| g.len()).sum::<usize>() - q.inflight.len())
            .unwrap_or(0)
    }
}

impl MessageQueue for InMemoryQueue {
    async fn send(&self, queue: &str, message: OutgoingMessage) -> Result<SendOutcome, QueueError> {
        let mut queues = self.queues.lock().unwrap();
        let state = queues.entry(queue.to_owned()).or_default();
        let now = Instant::now();
        state.reclaim_expired(now);

        if state.dedup.contains_key(&message.dedup_key) {
            return Ok(SendOutcome::Duplicate);
        }
        state
            .dedup
            .insert(message.dedup_key.clone(), now + crate::DEDUP_WINDOW);

        let id = Uuid::new_v4().to_string();
        let group = message.group_id.unwrap_or_else(|| id.clone());
        let msgs = state.groups.entry(group.clone()).or_default();
        msgs.push_back(StoredMessage {
            id,
            body: message.body,
            receive_count: 0,
        });
        if msgs.len() == 1 && !state.inflight_groups.contains(&group) {
            state.ready.push_back(group);
        }
        Ok(SendOutcome::Enqueued)
    }

    async fn receive(
        &self,
        queue: &str,
        visibility: Duration,
        wait: Duration,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            {
                let mut queues = self.queues.lock().unwrap();
                if let Some(state) = queues.get_mut(queue) {
                    let now = Instant::now();
                    state.reclaim_expired(now);

                    while let Some(group) = state.ready.pop_front() {
                        let Some(msgs) = state.groups.get_mut(&group) else {
                            continue;
                        };
                        let Some(head) = msgs.front_mut() else {
                            continue;
                        };
                        head.receive_count += 1;
                        if head.receive_count > self.max_receive_count {
                            let dead = msgs.pop_front().unwrap();
                            state.dead_letters.push(dead);
                            if !msgs.is_empty() {
                                state.ready.push_back(group);
                            }
                            continue;
                        }
                        let message = ReceivedMessage {
                            receipt: Receipt {
                                message_id: head.id.clone(),
                                group_id: group.clone(),
                            },
                            body: head.body.clone(),
                            receive_count: head.receive_count,
                        };
                        state.inflight.insert(head.id.clone(), now + visibility);
                        state.inflight_groups.insert(group);
                        return Ok(Some(message));
                    }
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn ack(&self, queue: &str, receipt: &Receipt) -> Result<(), QueueError> {
        let mut queues = self.queues.lock().unwrap();
        if let Some(state) = queues.get_mut(queue) {
            state.inflight.remove(&receipt.message_id);
            state.inflight_groups.remove(&receipt.group_id);
            if let Some(msgs) = state.groups.get_mut(&receipt.group_id) {
                if msgs.front().is_some_and(|m| m.id == receipt.message_id) {
                    msgs.pop_front();
                }
                if !msgs.is_empty() {
                    state.ready.push_back(receipt.group_id.clone());
                }
            }
        }
        Ok(())
    }

    async fn nack(&self, queue: &str, receipt: &Receipt) -> Result<(), QueueError> {
        let mut queues = self.queues.lock().unwrap();
        if let Some(state) = queues.get_mut(queue) {
            if state.inflight.remove(&receipt.message_id).is_some() {
                state.inflight_groups.remove(&receipt.group_id);
                state.ready.push_back(receipt.group_id.clone());
            }
        }
        Ok(())
    }

    async fn dead_letter_len(&self, queue: &str) -> Result<u64, QueueError> {
        let queues = self.queues.lock().unwrap();
        Ok(queues
            .get(queue)
            .map(|q| q.dead_letters.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q: &str = "test-queue";

    fn msg(group: &str, dedup: &str, body: &[u8]) -> OutgoingMessage {
        OutgoingMessage {
            group_id: Some(group.to_owned()),
            dedup_key: dedup.to_owned(),
            body: body.to_vec(),
        }
    }

    #[tokio::test]
    async fn should_deliver_same_group_in_fifo_order() {
        let queue = InMemoryQueue::new();
        queue.send(Q, msg("g1", "d1", b"first")).await.unwrap();
        queue.send(Q, msg("g1", "d2", b"second")).await.unwrap();

        let first = queue
            .receive(Q, Duration::from_secs(30), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.body, b"first");

        // Second message is blocked until the first is acked.
        assert!(queue
            .receive(Q, Duration::from_secs(30), Duration::ZERO)
            .await
            .unwrap()
            .is_none());

        queue.ack(Q, &first.receipt).await.unwrap();
        let second = queue
            .receive(Q, Duration::from_secs(30), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.body, b"second");
    }

    #[tokio::test]
    async fn should_deliver_different_groups_concurrently() {
        let queue = InMemoryQueue::new();
        queue.send(Q, msg("g1", "d1", b"one")).await.unwrap();
        queue.send(Q, msg("g2", "d2", b"two")).await.unwrap();

        let a = queue
            .receive(Q, Duration::from_secs(30), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        let b = queue
            .receive(Q, Duration::from_secs(30), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(a.receipt.group_id, b.receipt.group_id);
    }

    #[tokio::test]
    async fn should_suppress_duplicate_dedup_keys() {
        let queue = InMemoryQueue::new();
        assert_eq!(
            queue.send(Q, msg("g1", "same", b"x")).await.unwrap(),
            SendOutcome::Enqueued
        );
        assert_eq!(
            queue.send(Q, msg("g1", "same", b"x")).await.unwrap(),
            SendOutcome::Duplicate
        );
        assert_eq!(queue.pending_len(Q), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_redeliver_after_visibility_timeout_with_bumped_count() {
        let queue = InMemoryQueue::new();
        queue.send(Q, msg("g1", "d1", b"x")).await.unwrap();

        let first = queue
            .receive(Q, Duration::from_secs(1), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.receive_count, 1);

        tokio::time::advance(Duration::from_secs(2)).await;

        let second = queue
            .receive(Q, Duration::from_secs(1), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.receipt.message_id, first.receipt.message_id);
        assert_eq!(second.receive_count, 2);
    }

    #[tokio::test]
    async fn should_redeliver_immediately_after_nack() {
        let queue = InMemoryQueue::new();
        queue.send(Q, msg("g1", "d1", b"x")).await.unwrap();

        let first = queue
            .receive(Q, Duration::from_secs(30), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        queue.nack(Q, &first.receipt).await.unwrap();

        let second = queue
            .receive(Q, Duration::from_secs(30), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.receive_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_park_poison_message_on_dead_letter_list() {
        let queue = InMemoryQueue::new().with_max_receive_count(2);
        queue.send(Q, msg("g1", "d1", b"poison")).await.unwrap();
        queue.send(Q, msg("g1", "d2", b"next")).await.unwrap();

        for _ in 0..2 {
            let delivery = queue
                .receive(Q, Duration::from_millis(10), Duration::ZERO)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(delivery.body, b"poison");
            tokio::time::advance(Duration::from_millis(20)).await;
        }

        // Third attempt exceeds the cap: poison parks, next message flows.
        let delivery = queue
            .receive(Q, Duration::from_secs(30), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivery.body, b"next");
        assert_eq!(queue.dead_letter_len(Q).await.unwrap(), 1);
    }
}
