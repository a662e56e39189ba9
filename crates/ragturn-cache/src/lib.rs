//! TTL-backed [`ChatState`] storage, backed by Redis.

use async_trait::async_trait;
use ragturn_core::error::ChatError;
use ragturn_core::traits::ChatCache;
use ragturn_core::types::ChatState;
use redis::AsyncCommands;
use tracing::{debug, instrument};

/// Redis-backed session cache.
///
/// Wraps a single multiplexed [`redis::aio::ConnectionManager`] — cheap to
/// clone, safe to share across tasks, and auto-reconnects on transport
/// errors.
pub struct RedisChatCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisChatCache {
    pub async fn connect(url: &str) -> Result<Self, ChatError> {
        let client = redis::Client::open(url)
            .map_err(|e| ChatError::CacheTransport(e.to_string()))?;
        let conn = client
            .get_tokio_connection_manager()
            .await
            .map_err(|e| ChatError::CacheTransport(e.to_string()))?;
        Ok(Self { conn })
    }

    pub fn from_connection_manager(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ChatCache for RedisChatCache {
    #[instrument(skip(self, state), fields(chat_id))]
    async fn set(&self, chat_id: &str, state: &ChatState, ttl_secs: u64) -> Result<(), ChatError> {
        let payload = serde_json::to_string(state)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(chat_id, payload, ttl_secs)
            .await
            .map_err(|e| ChatError::CacheTransport(e.to_string()))?;
        debug!(chat_id, ttl_secs, "chat state written to cache");
        Ok(())
    }

    #[instrument(skip(self), fields(chat_id))]
    async fn get(&self, chat_id: &str) -> Result<Option<ChatState>, ChatError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(chat_id)
            .await
            .map_err(|e| ChatError::CacheTransport(e.to_string()))?;
        match payload {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(chat_id))]
    async fn delete(&self, chat_id: &str) -> Result<(), ChatError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(chat_id)
            .await
            .map_err(|e| ChatError::CacheTransport(e.to_string()))?;
        Ok(())
    }
}

/// Deterministic in-process [`ChatCache`] for tests — no TTL enforcement,
/// since tests don't wait out real time.
pub mod testing {
    use super::*;
    use dashmap::DashMap;

    #[derive(Default)]
    pub struct InMemoryChatCache {
        entries: DashMap<String, ChatState>,
    }

    impl InMemoryChatCache {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl ChatCache for InMemoryChatCache {
        async fn set(&self, chat_id: &str, state: &ChatState, _ttl_secs: u64) -> Result<(), ChatError> {
            self.entries.insert(chat_id.to_string(), state.clone());
            Ok(())
        }

        async fn get(&self, chat_id: &str) -> Result<Option<ChatState>, ChatError> {
            Ok(self.entries.get(chat_id).map(|e| e.clone()))
        }

        async fn delete(&self, chat_id: &str) -> Result<(), ChatError> {
            self.entries.remove(chat_id);
            Ok(())
        }
    }
}
