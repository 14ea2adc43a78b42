use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use prost::Message as _;
use tokio::sync::Notify;
use uuid::Uuid;

use tably_authorization::domain::repository::OutboxStore;
use tably_authorization::domain::types::OutboxRow;
use tably_authorization::error::AuthorizationError;
use tably_authorization::infra::relay::OutboxRelay;
use tably_proto::payments::v1::AuthRequestQueuedMessage;
use tably_queue::memory::InMemoryQueue;
use tably_queue::{MessageQueue, OutgoingMessage, QueueError, SendOutcome};

const AUTH_QUEUE: &str = "payment-auth-requests.fifo";

// ── Mock outbox store ────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct MockOutbox {
    rows: Arc<Mutex<Vec<(OutboxRow, Option<DateTime<Utc>>, Option<DateTime<Utc>>)>>>,
}

impl MockOutbox {
    fn push(&self, destination: &str, group: Option<&str>, payload: Vec<u8>) -> Uuid {
        let id = Uuid::new_v4();
        self.rows.lock().unwrap().push((
            OutboxRow {
                id,
                destination: destination.to_owned(),
                message_group: group.map(str::to_owned),
                payload,
                attempts: 0,
            },
            None,
            None,
        ));
        id
    }

    fn processed_ids(&self) -> Vec<Uuid> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, processed, _)| processed.is_some())
            .map(|(row, _, _)| row.id)
            .collect()
    }

    fn attempts(&self, id: Uuid) -> i32 {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|(row, _, _)| row.id == id)
            .map(|(row, _, _)| row.attempts)
            .unwrap()
    }
}

impl OutboxStore for MockOutbox {
    async fn fetch_due(&self, limit: u64) -> Result<Vec<OutboxRow>, AuthorizationError> {
        let now = Utc::now();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, processed, next_attempt)| {
                processed.is_none() && next_attempt.map(|at| at <= now).unwrap_or(true)
            })
            .take(limit as usize)
            .map(|(row, _, _)| row.clone())
            .collect())
    }

    async fn mark_processed(&self, id: Uuid) -> Result<(), AuthorizationError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some((_, processed, _)) = rows.iter_mut().find(|(row, _, _)| row.id == id) {
            *processed = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        _error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), AuthorizationError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some((row, _, next)) = rows.iter_mut().find(|(row, _, _)| row.id == id) {
            row.attempts += 1;
            *next = Some(next_attempt_at);
        }
        Ok(())
    }
}

// A queue that always refuses sends, for the backoff path.
struct BrokenQueue;

impl MessageQueue for BrokenQueue {
    async fn send(&self, _: &str, _: OutgoingMessage) -> Result<SendOutcome, QueueError> {
        Err(QueueError::Backend(anyhow::anyhow!("redis down")))
    }
    async fn receive(
        &self,
        _: &str,
        _: Duration,
        _: Duration,
    ) -> Result<Option<tably_queue::ReceivedMessage>, QueueError> {
        Ok(None)
    }
    async fn ack(&self, _: &str, _: &tably_queue::Receipt) -> Result<(), QueueError> {
        Ok(())
    }
    async fn nack(&self, _: &str, _: &tably_queue::Receipt) -> Result<(), QueueError> {
        Ok(())
    }
    async fn dead_letter_len(&self, _: &str) -> Result<u64, QueueError> {
        Ok(0)
    }
}

fn relay<Q: MessageQueue>(store: MockOutbox, queue: Q) -> OutboxRelay<MockOutbox, Q> {
    OutboxRelay {
        store,
        queue,
        interval: Duration::from_millis(50),
        batch_size: 10,
        wakeup: Arc::new(Notify::new()),
    }
}

fn queued_message(auth_request_id: Uuid) -> Vec<u8> {
    AuthRequestQueuedMessage {
        auth_request_id: auth_request_id.to_string(),
        restaurant_id: Uuid::new_v4().to_string(),
        created_at: Utc::now().timestamp(),
    }
    .encode_to_vec()
}

#[tokio::test]
async fn should_publish_due_rows_and_mark_them_processed() {
    let store = MockOutbox::default();
    let aggregate = Uuid::new_v4();
    let first = store.push(AUTH_QUEUE, Some(&aggregate.to_string()), queued_message(aggregate));
    let second = store.push(AUTH_QUEUE, Some(&aggregate.to_string()), queued_message(aggregate));

    let queue = InMemoryQueue::new();
    let under_test = relay(store.clone(), queue);
    let delivered = under_test.drain().await.unwrap();

    assert_eq!(delivered, 2);
    assert_eq!(store.processed_ids(), vec![first, second]);

    // Both messages landed in the same group, in append order.
    let received = under_test
        .queue
        .receive(AUTH_QUEUE, Duration::from_secs(30), Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.receipt.group_id, aggregate.to_string());
}

#[tokio::test]
async fn should_suppress_republish_of_already_delivered_rows() {
    let store = MockOutbox::default();
    let aggregate = Uuid::new_v4();
    let row_id = store.push(AUTH_QUEUE, Some(&aggregate.to_string()), queued_message(aggregate));

    let queue = InMemoryQueue::new();
    // Simulate a crash between publish and mark-processed: the queue already
    // has the message under this dedup key.
    queue
        .send(
            AUTH_QUEUE,
            OutgoingMessage {
                group_id: Some(aggregate.to_string()),
                dedup_key: row_id.to_string(),
                body: queued_message(aggregate),
            },
        )
        .await
        .unwrap();

    let under_test = relay(store.clone(), queue);
    let delivered = under_test.drain().await.unwrap();

    assert_eq!(delivered, 1, "row is settled by the dedup hit");
    assert_eq!(store.processed_ids(), vec![row_id]);
    assert_eq!(under_test.queue.pending_len(AUTH_QUEUE), 1, "no duplicate enqueued");
}

#[tokio::test]
async fn should_back_off_failed_publishes_with_attempt_counting() {
    let store = MockOutbox::default();
    let aggregate = Uuid::new_v4();
    let row_id = store.push(AUTH_QUEUE, Some(&aggregate.to_string()), queued_message(aggregate));

    let under_test = relay(store.clone(), BrokenQueue);
    let delivered = under_test.drain().await.unwrap();

    assert_eq!(delivered, 0);
    assert!(store.processed_ids().is_empty());
    assert_eq!(store.attempts(row_id), 1);

    // The row is parked until its next_attempt_at; an immediate second pass
    // must not retry it.
    let delivered = under_test.drain().await.unwrap();
    assert_eq!(delivered, 0);
    assert_eq!(store.attempts(row_id), 1);
}
