use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::db::PatternStore;
use crate::error::PrefetchResult;
use crate::models::UserBehaviorPattern;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Behavior(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Behavior(user_id) => write!(f, "behavior:{}", user_id),
        }
    }
}

/// Creates a Redis client for behavior pattern persistence
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Redis-backed store for user behavior patterns
#[derive(Clone)]
pub struct RedisPatternStore {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
    ttl_secs: u64,
}

/// Handle for gracefully shutting down the pattern writer
///
/// Dropping the handle leaves the writer running until every store clone is
/// gone, but pending writes are then no longer guaranteed to be flushed.
#[must_use = "call shutdown() on exit so pending pattern writes are flushed"]
pub struct PatternWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl PatternWriterHandle {
    /// Signals the writer task to stop and waits until pending writes are flushed
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Pattern writer shutdown signal sent");
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Pattern writer task ended abnormally");
        }
    }
}

impl RedisPatternStore {
    /// Creates a store with a background task that performs the Redis writes
    ///
    /// Saves only enqueue a message, so the scroll path never waits on Redis.
    pub fn new(redis_client: Client, ttl_secs: u64) -> (Self, PatternWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        let task = tokio::spawn(async move {
            Self::pattern_writer_task(client, write_rx, shutdown_rx).await;
        });

        let store = Self {
            redis_client,
            write_tx,
            ttl_secs,
        };

        (store, PatternWriterHandle { shutdown_tx, task })
    }

    /// Drains write messages until shutdown, then flushes what is left
    async fn pattern_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Pattern writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::warn!(error = %e, "Failed to write behavior pattern to Redis");
                    }
                }
                Some(()) = shutdown_rx.recv() => {
                    write_rx.close();
                    let mut flushed = 0usize;
                    while let Some(msg) = write_rx.recv().await {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::warn!(error = %e, "Failed to flush behavior pattern during shutdown");
                        } else {
                            flushed += 1;
                        }
                    }

                    tracing::info!(flushed, "Pattern writer task stopped");
                    break;
                }
                else => {
                    tracing::info!("Pattern writer task stopped, all senders dropped");
                    break;
                }
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> PrefetchResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    async fn read_from_redis(&self, key: &CacheKey) -> PrefetchResult<Option<UserBehaviorPattern>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl PatternStore for RedisPatternStore {
    async fn load(&self, user_id: &str) -> Option<UserBehaviorPattern> {
        let key = CacheKey::Behavior(user_id.to_string());
        match self.read_from_redis(&key).await {
            Ok(pattern) => pattern,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Behavior pattern load failed, treating as miss");
                None
            }
        }
    }

    fn save(&self, pattern: &UserBehaviorPattern) {
        let json = match serde_json::to_string(pattern) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Behavior pattern serialization error");
                return;
            }
        };

        let msg = CacheWriteMessage {
            key: CacheKey::Behavior(pattern.user_id.clone()).to_string(),
            value: json,
            ttl: self.ttl_secs,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::warn!(error = %e, "Failed to send pattern write message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedTab;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    #[test]
    fn test_cache_key_display_behavior() {
        let key = CacheKey::Behavior("u1".to_string());
        assert_eq!(format!("{}", key), "behavior:u1");
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_a_miss() {
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (store, _handle) = RedisPatternStore::new(client, 60);

        assert!(store.load("u1").await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_handle_keeps_writer_running() {
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (store, handle) = RedisPatternStore::new(client, 60);
        drop(handle);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(!store.write_tx.is_closed());
        store.save(&UserBehaviorPattern::new("u1", FeedTab::ForYou));
        assert!(!store.write_tx.is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_stops_writer() {
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (store, handle) = RedisPatternStore::new(client, 60);

        handle.shutdown().await;

        assert!(store.write_tx.is_closed());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_save_then_load() {
        let client = create_redis_client(&redis_url()).unwrap();
        let (store, handle) = RedisPatternStore::new(client.clone(), 60);

        let mut pattern = UserBehaviorPattern::new("redis_test_user", FeedTab::Following);
        pattern.average_velocity = 1.25;
        store.save(&pattern);

        // Shutdown flushes pending writes
        handle.shutdown().await;

        let loaded = store.load("redis_test_user").await.unwrap();
        assert_eq!(loaded, pattern);

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.del("behavior:redis_test_user").await.unwrap();
    }
}
