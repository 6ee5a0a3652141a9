//! Redis session backend
//!
//! Sessions are kept as Redis hashes:
//! - Key: `prefix + session_id` (default prefix: "session:")
//! - Field `json`: the whole session map serialized as JSON
//! - TTL: refreshed with EXPIRE on every persist

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::SessionBackend;
use crate::config::ProviderConfig;
use crate::error::SessionError;

/// Redis session backend
///
/// Wraps a multiplexed [`ConnectionManager`], so one instance can be shared by
/// the provider and every session store it hands out.
///
/// # Example
///
/// ```rust,ignore
/// use hredis_session::RedisBackend;
///
/// let client = redis::Client::open("redis://127.0.0.1/1")?;
/// let backend = RedisBackend::new(client).await?;
/// ```
pub struct RedisBackend {
    conn: Arc<ConnectionManager>,
    command_timeout: Option<Duration>,
}

impl RedisBackend {
    /// Create a new Redis backend
    pub async fn new(client: redis::Client) -> Result<Self, SessionError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn: Arc::new(conn),
            command_timeout: None,
        })
    }

    /// Create a new Redis backend from a connection string
    pub async fn from_url(url: &str) -> Result<Self, SessionError> {
        let client = redis::Client::open(url)
            .map_err(|e| SessionError::ConnectionError(format!("Failed to create Redis client: {}", e)))?;
        Self::new(client).await
    }

    /// Connect using the address, database and timeout of a provider configuration
    pub async fn from_config(config: &ProviderConfig) -> Result<Self, SessionError> {
        let url = config.redis_url();
        let connect = Self::from_url(&url);
        let backend = match config.command_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| SessionError::ConnectionError(format!("Timed out connecting to {}", url)))??,
            None => connect.await?,
        };
        Ok(backend.with_command_timeout(config.command_timeout))
    }

    /// Bound every command by `timeout`
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    fn connection(&self) -> ConnectionManager {
        (*self.conn).clone()
    }

    async fn run<T, F>(&self, command: F) -> Result<T, SessionError>
    where
        F: Future<Output = redis::RedisResult<T>> + Send,
    {
        match self.command_timeout {
            Some(limit) => match tokio::time::timeout(limit, command).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(SessionError::Timeout),
            },
            None => Ok(command.await?),
        }
    }
}

impl Clone for RedisBackend {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            command_timeout: self.command_timeout,
        }
    }
}

#[async_trait]
impl SessionBackend for RedisBackend {
    async fn ping(&self) -> Result<(), SessionError> {
        let mut conn = self.connection();
        let pong = self
            .run(async move {
                let pong: redis::RedisResult<String> =
                    redis::cmd("PING").query_async(&mut conn).await;
                pong
            })
            .await
            .map_err(|e| SessionError::ConnectionError(e.to_string()))?;
        tracing::debug!("Redis answered ping: {}", pong);
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), SessionError> {
        let mut conn = self.connection();
        self.run(async move { conn.hset::<_, _, _, ()>(key, field, value).await })
            .await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, SessionError> {
        let mut conn = self.connection();
        self.run(async move { conn.hget(key, field).await }).await
    }

    async fn exists(&self, key: &str) -> Result<bool, SessionError> {
        let mut conn = self.connection();
        self.run(async move { conn.exists(key).await }).await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, SessionError> {
        let mut conn = self.connection();
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        self.run(async move { conn.expire(key, ttl).await }).await
    }

    async fn rename(&self, key: &str, new_key: &str) -> Result<(), SessionError> {
        let mut conn = self.connection();
        self.run(async move { conn.rename::<_, _, ()>(key, new_key).await })
            .await
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool, SessionError> {
        let mut conn = self.connection();
        let removed: i64 = self.run(async move { conn.hdel(key, field).await }).await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    // Tests require a running Redis instance
    // Run with: cargo test --features redis-store -- --ignored

    use super::*;

    #[tokio::test]
    #[ignore]
    async fn test_redis_backend_basic() {
        let backend = RedisBackend::from_url("redis://127.0.0.1/").await.unwrap();
        backend.ping().await.unwrap();

        let key = format!("session:test-{}", uuid::Uuid::new_v4());
        let renamed = format!("session:test-{}", uuid::Uuid::new_v4());

        backend.hset(&key, "json", r#"{"user":"alice"}"#).await.unwrap();
        assert!(backend.expire(&key, 60).await.unwrap());
        assert_eq!(
            backend.hget(&key, "json").await.unwrap(),
            Some(r#"{"user":"alice"}"#.to_string())
        );

        backend.rename(&key, &renamed).await.unwrap();
        assert!(!backend.exists(&key).await.unwrap());
        assert!(backend.exists(&renamed).await.unwrap());

        assert!(backend.hdel(&renamed, "json").await.unwrap());
        assert!(!backend.exists(&renamed).await.unwrap());
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_backend_rename_missing_key() {
        let backend = RedisBackend::from_url("redis://127.0.0.1/").await.unwrap();
        let key = format!("session:missing-{}", uuid::Uuid::new_v4());
        assert!(backend.rename(&key, "session:nowhere").await.is_err());
    }
}
