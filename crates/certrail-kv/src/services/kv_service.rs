//! KV store seam and its Redis backend

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::KvError;

/// String key/value store shared with the challenge endpoint and cache readers.
///
/// Implementations must make each single-key write or delete atomic; nothing
/// here relies on multi-key transactions.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Set a value, overwriting any previous one
    async fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), KvError>;
}

/// Redis-backed KV store
pub struct RedisKvStore {
    connection: ConnectionManager,
}

impl RedisKvStore {
    /// Connect to Redis at `redis_url`
    pub async fn connect(redis_url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| KvError::ConnectionFailed(e.to_string()))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| KvError::ConnectionFailed(e.to_string()))?;

        Ok(Self { connection })
    }

    /// Wrap an existing connection manager
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.connection.clone();
        debug!("KV GET {}", key);

        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut conn = self.connection.clone();
        debug!("KV SET {}", key);

        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.connection.clone();
        debug!("KV DEL {}", key);

        let _: i64 = conn.del(key).await?;
        Ok(())
    }
}
