//! Redis-backed FIFO queue.
//!
//! Key layout for a queue named `q`:
//!
//! ```text
//! q:ready            LIST  groups with a deliverable head message
//! q:group:{g}        LIST  message ids for group g, head = oldest
//! q:msg:{id}         HASH  body, group, receive_count, enqueued_at
//! q:dedup:{key}      STR   dedup marker, expires after the dedup window
//! q:inflight         ZSET  message id -> visibility deadline (unix ms)
//! q:inflight_groups  SET   groups with an in-flight delivery
//! q:dlq              LIST  message ids past the max receive count
//! ```
//!
//! Every state transition is one Lua script, so concurrent workers see
//! atomic claim/ack/reclaim operations and per-group ordering holds: a group
//! is either in `ready` or in `inflight_groups`, never both.

use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;
use deadpool_redis::Pool;
use deadpool_redis::redis::Script;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    DEDUP_WINDOW, MessageQueue, OutgoingMessage, QueueError, ReceivedMessage, Receipt, SendOutcome,
};

/// Max deliveries before a message is parked on the dead-letter list.
const DEFAULT_MAX_RECEIVE_COUNT: u32 = 6;

/// Poll interval while emulating long-poll receive.
const RECEIVE_POLL_INTERVAL: Duration = Duration::from_millis(100);

const SEND_SCRIPT: &str = r#"
if redis.call('SET', KEYS[4], ARGV[1], 'NX', 'EX', ARGV[5]) == false then
  return 0
end
redis.call('HSET', KEYS[3],
  'body', ARGV[3], 'group', ARGV[2], 'receive_count', 0, 'enqueued_at', ARGV[4])
redis.call('RPUSH', KEYS[2], ARGV[1])
if redis.call('LLEN', KEYS[2]) == 1
   and redis.call('SISMEMBER', KEYS[5], ARGV[2]) == 0 then
  redis.call('RPUSH', KEYS[1], ARGV[2])
end
return 1
"#;

const RECEIVE_SCRIPT: &str = r#"
local g = redis.call('LPOP', KEYS[1])
if not g then return nil end
local glist = ARGV[3]..':group:'..g
local id = redis.call('LINDEX', glist, 0)
if not id then return nil end
local mkey = ARGV[3]..':msg:'..id
local rc = redis.call('HINCRBY', mkey, 'receive_count', 1)
if tonumber(rc) > tonumber(ARGV[2]) then
  redis.call('LPOP', glist)
  redis.call('RPUSH', ARGV[3]..':dlq', id)
  if redis.call('LLEN', glist) > 0 then redis.call('RPUSH', KEYS[1], g) end
  return {'dlq', id, '', '', 0}
end
redis.call('SADD', KEYS[3], g)
redis.call('ZADD', KEYS[2], ARGV[1], id)
local body = redis.call('HGET', mkey, 'body')
return {'ok', id, g, body, rc}
"#;

const ACK_SCRIPT: &str = r#"
redis.call('ZREM', KEYS[2], ARGV[1])
redis.call('SREM', KEYS[3], ARGV[2])
local glist = ARGV[3]..':group:'..ARGV[2]
if redis.call('LINDEX', glist, 0) == ARGV[1] then
  redis.call('LPOP', glist)
end
redis.call('DEL', ARGV[3]..':msg:'..ARGV[1])
if redis.call('LLEN', glist) > 0 then redis.call('RPUSH', KEYS[1], ARGV[2]) end
return 1
"#;

const NACK_SCRIPT: &str = r#"
if redis.call('ZREM', KEYS[2], ARGV[1]) == 0 then return 0 end
redis.call('SREM', KEYS[3], ARGV[2])
redis.call('RPUSH', KEYS[1], ARGV[2])
return 1
"#;

const RECLAIM_SCRIPT: &str = r#"
local expired = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
local n = 0
for _, id in ipairs(expired) do
  redis.call('ZREM', KEYS[2], id)
  local g = redis.call('HGET', ARGV[2]..':msg:'..id, 'group')
  if g then
    redis.call('SREM', KEYS[3], g)
    redis.call('RPUSH', KEYS[1], g)
    n = n + 1
  end
end
return n
"#;

/// Redis implementation of [`MessageQueue`].
#[derive(Clone)]
pub struct RedisFifoQueue {
    pool: Pool,
    max_receive_count: u32,
}

impl RedisFifoQueue {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
        }
    }

    pub fn with_max_receive_count(mut self, max_receive_count: u32) -> Self {
        self.max_receive_count = max_receive_count;
        self
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, QueueError> {
        Ok(self
            .pool
            .get()
            .await
            .context("acquire redis connection")?)
    }

    async fn reclaim_expired(&self, queue: &str) -> Result<u64, QueueError> {
        let mut conn = self.conn().await?;
        let reclaimed: u64 = Script::new(RECLAIM_SCRIPT)
            .key(format!("{queue}:ready"))
            .key(format!("{queue}:inflight"))
            .key(format!("{queue}:inflight_groups"))
            .arg(Utc::now().timestamp_millis())
            .arg(queue)
            .invoke_async(&mut *conn)
            .await
            .context("reclaim expired messages")?;
        if reclaimed > 0 {
            warn!(queue, reclaimed, "reclaimed expired in-flight messages");
        }
        Ok(reclaimed)
    }

    async fn try_receive(
        &self,
        queue: &str,
        visibility: Duration,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        let deadline_ms = Utc::now().timestamp_millis() + visibility.as_millis() as i64;
        loop {
            let mut conn = self.conn().await?;
            let reply: Option<(String, String, String, Vec<u8>, u32)> =
                Script::new(RECEIVE_SCRIPT)
                    .key(format!("{queue}:ready"))
                    .key(format!("{queue}:inflight"))
                    .key(format!("{queue}:inflight_groups"))
                    .arg(deadline_ms)
                    .arg(self.max_receive_count)
                    .arg(queue)
                    .invoke_async(&mut *conn)
                    .await
                    .context("receive message")?;

            match reply {
                None => return Ok(None),
                Some((tag, id, _, _, _)) if tag == "dlq" => {
                    warn!(queue, message_id = %id, "message moved to dead-letter list");
                    continue; // try the next ready group
                }
                Some((_, id, group, body, receive_count)) => {
                    debug!(queue, message_id = %id, group = %group, receive_count,
                        "message received");
                    return Ok(Some(ReceivedMessage {
                        receipt: Receipt {
                            message_id: id,
                            group_id: group,
                        },
                        body,
                        receive_count,
                    }));
                }
            }
        }
    }
}

impl MessageQueue for RedisFifoQueue {
    async fn send(&self, queue: &str, message: OutgoingMessage) -> Result<SendOutcome, QueueError> {
        let message_id = Uuid::new_v4().to_string();
        let group = message
            .group_id
            .unwrap_or_else(|| message_id.clone());
        let dedup_key = message.dedup_key;
        let mut conn = self.conn().await?;

        let enqueued: u32 = Script::new(SEND_SCRIPT)
            .key(format!("{queue}:ready"))
            .key(format!("{queue}:group:{group}"))
            .key(format!("{queue}:msg:{message_id}"))
            .key(format!("{queue}:dedup:{dedup_key}"))
            .key(format!("{queue}:inflight_groups"))
            .arg(&message_id)
            .arg(&group)
            .arg(message.body)
            .arg(Utc::now().timestamp_millis())
            .arg(DEDUP_WINDOW.as_secs())
            .invoke_async(&mut *conn)
            .await
            .context("send message")?;

        if enqueued == 1 {
            debug!(queue, message_id = %message_id, group = %group, "message enqueued");
            Ok(SendOutcome::Enqueued)
        } else {
            debug!(queue, dedup_key = %dedup_key, "duplicate send suppressed");
            Ok(SendOutcome::Duplicate)
        }
    }

    async fn receive(
        &self,
        queue: &str,
        visibility: Duration,
        wait: Duration,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        self.reclaim_expired(queue).await?;
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(message) = self.try_receive(queue, visibility).await? {
                return Ok(Some(message));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(RECEIVE_POLL_INTERVAL.min(wait)).await;
        }
    }

    async fn ack(&self, queue: &str, receipt: &Receipt) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let _: u32 = Script::new(ACK_SCRIPT)
            .key(format!("{queue}:ready"))
            .key(format!("{queue}:inflight"))
            .key(format!("{queue}:inflight_groups"))
            .arg(&receipt.message_id)
            .arg(&receipt.group_id)
            .arg(queue)
            .invoke_async(&mut *conn)
            .await
            .context("ack message")?;
        Ok(())
    }

    async fn nack(&self, queue: &str, receipt: &Receipt) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let _: u32 = Script::new(NACK_SCRIPT)
            .key(format!("{queue}:ready"))
            .key(format!("{queue}:inflight"))
            .key(format!("{queue}:inflight_groups"))
            .arg(&receipt.message_id)
            .arg(&receipt.group_id)
            .invoke_async(&mut *conn)
            .await
            .context("nack message")?;
        Ok(())
    }

    async fn dead_letter_len(&self, queue: &str) -> Result<u64, QueueError> {
        use deadpool_redis::redis::AsyncCommands;
        let mut conn = self.conn().await?;
        let len: u64 = conn
            .llen(format!("{queue}:dlq"))
            .await
            .context("read dead-letter length")?;
        Ok(len)
    }
}
