//! Generic Redis state store: key/value with TTL, FIFO lists, pub/sub, and
//! the WATCH/MULTI/EXEC compare-and-swap loop used to apply atomic updates.

use std::time::Duration;

use futures::StreamExt;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::{StateError, StateResult};

/// Default bound on optimistic-lock retries for [`StateStore::atomic_update`].
pub const DEFAULT_MAX_RETRIES: u32 = 10;

#[derive(Clone)]
pub struct StateStore {
    client: redis::Client,
}

impl StateStore {
    pub fn new(redis_url: &str) -> StateResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StateError::connection_failed(e.to_string()))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> StateResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(StateError::from)
    }

    pub async fn get(&self, key: &str) -> StateResult<Option<String>> {
        let mut conn = self.connection().await?;
        Ok(conn.get(key).await?)
    }

    pub async fn set(&self, key: &str, value: &str) -> StateResult<()> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StateResult<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> StateResult<()> {
        let mut conn = self.connection().await?;
        let _: u64 = conn.del(key).await?;
        Ok(())
    }

    /// Push a value onto the head of a list (enqueue).
    pub async fn lpush(&self, key: &str, value: &str) -> StateResult<()> {
        let mut conn = self.connection().await?;
        let _: u64 = conn.lpush(key, value).await?;
        Ok(())
    }

    /// Pop a value from the tail of a list (dequeue, FIFO with `lpush`).
    pub async fn rpop(&self, key: &str) -> StateResult<Option<String>> {
        let mut conn = self.connection().await?;
        Ok(conn.rpop(key, None).await?)
    }

    pub async fn publish(&self, channel: &str, payload: &str) -> StateResult<()> {
        let mut conn = self.connection().await?;
        let _: u64 = conn.publish(channel, payload).await?;
        Ok(())
    }

    /// Subscribe to `channel` and wait up to `timeout` for a single message,
    /// returning its payload. `None` means the wait elapsed with nothing
    /// received, not that the channel is dead; callers pair this with a
    /// catch-up read of whatever key the channel announces changes to, since
    /// a message published before this call subscribes is otherwise lost.
    pub async fn wait_for_publish(&self, channel: &str, timeout: Duration) -> StateResult<Option<String>> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(StateError::from)?;
        pubsub.subscribe(channel).await.map_err(StateError::from)?;

        let mut messages = pubsub.into_on_message();
        match tokio::time::timeout(timeout, messages.next()).await {
            Ok(Some(msg)) => Ok(msg.get_payload::<String>().ok()),
            Ok(None) | Err(_) => Ok(None),
        }
    }

    /// Scan all keys matching a glob pattern. Used for job listing; the
    /// recap job set is small enough that a full scan is acceptable.
    pub async fn scan_keys(&self, pattern: &str) -> StateResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let mut cursor = 0u64;
        let mut keys = Vec::new();
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }

    /// Atomically read-transform-write the value at `key` using Redis
    /// WATCH/MULTI/EXEC optimistic concurrency, retrying on conflicting
    /// concurrent writers up to `max_retries` times. `transform` receives
    /// the current raw value (`None` if the key is missing) and returns
    /// either `Some(new_value, publish)` to commit a write (optionally
    /// publishing `publish` on `publish_channel`), or `None` to signal that
    /// no update should be applied (key missing, terminal, or no-op).
    ///
    /// Returns `true` if a write was committed, `false` if `transform`
    /// declined to apply an update.
    pub async fn atomic_update<F>(
        &self,
        key: &str,
        publish_channel: Option<&str>,
        max_retries: u32,
        mut transform: F,
    ) -> StateResult<bool>
    where
        F: FnMut(Option<&str>) -> Option<(String, Option<String>)>,
    {
        let mut conn = self.connection().await?;

        for attempt in 0..max_retries {
            let _: () = redis::cmd("WATCH").arg(key).query_async(&mut conn).await?;

            let current: Option<String> = conn.get(key).await?;
            let Some((new_value, publish)) = transform(current.as_deref()) else {
                let _: () = redis::cmd("UNWATCH").query_async(&mut conn).await?;
                return Ok(false);
            };

            let mut pipe = redis::pipe();
            pipe.atomic().set(key, &new_value);
            if let (Some(channel), Some(payload)) = (publish_channel, &publish) {
                pipe.publish(channel, payload);
            }

            let result: Option<()> = pipe.query_async(&mut conn).await?;
            match result {
                Some(()) => return Ok(true),
                None => {
                    debug!(key, attempt, "atomic update watch conflict, retrying");
                    continue;
                }
            }
        }

        Err(StateError::OptimisticLockExhausted {
            key: key.to_string(),
            attempts: max_retries,
        })
    }
}
