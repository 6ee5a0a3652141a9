//! Session backend trait

use async_trait::async_trait;
use crate::error::SessionError;

/// Remote key/value service holding session records
///
/// This is the subset of Redis hash and key commands the provider needs.
/// Keys passed in are already namespaced (`prefix + session_id`).
/// Implementations must be safe to share between tasks without extra locking.
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    /// Liveness check
    async fn ping(&self) -> Result<(), SessionError>;

    /// Set a hash field, creating the key if needed
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), SessionError>;

    /// Get a hash field
    ///
    /// Returns None if the key or the field doesn't exist
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, SessionError>;

    /// Check whether a key exists
    async fn exists(&self, key: &str) -> Result<bool, SessionError>;

    /// Set a key's time-to-live in seconds
    ///
    /// Returns false if the key doesn't exist
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, SessionError>;

    /// Atomically rename a key, replacing `new_key` if present
    ///
    /// Fails if `key` doesn't exist
    async fn rename(&self, key: &str, new_key: &str) -> Result<(), SessionError>;

    /// Delete a hash field
    ///
    /// Returns whether the field existed. Removing the last field removes the key.
    async fn hdel(&self, key: &str, field: &str) -> Result<bool, SessionError>;
}
