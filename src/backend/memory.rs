//! In-memory session backend
//!
//! This is primarily for development and testing.
//! For production, use RedisBackend or another shared backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::SessionBackend;
use crate::error::SessionError;

#[derive(Default)]
struct StoredHash {
    fields: HashMap<String, String>,
    expires_at: Option<Instant>,
}

impl StoredHash {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }
}

/// In-memory backend mirroring the Redis semantics the provider relies on
///
/// Warning: This backend is not suitable for production use because:
/// - Sessions are lost on server restart
/// - Sessions are not shared across multiple server instances
/// - Expired keys are only dropped when touched or on `cleanup_expired`
pub struct MemoryBackend {
    hashes: Arc<RwLock<HashMap<String, StoredHash>>>,
}

impl MemoryBackend {
    /// Create a new memory backend
    pub fn new() -> Self {
        Self {
            hashes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.hashes
            .read()
            .values()
            .filter(|stored| !stored.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time-to-live of a key, None if it has none or doesn't exist
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let hashes = self.hashes.read();
        let stored = hashes.get(key).filter(|stored| !stored.is_expired(now))?;
        stored.expires_at.map(|exp| exp.saturating_duration_since(now))
    }

    /// Clean up expired keys
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.hashes.write().retain(|_, stored| !stored.is_expired(now));
    }

    /// Drop `key` if it has expired, then return its live entry
    fn live_entry<'a>(
        hashes: &'a mut HashMap<String, StoredHash>,
        key: &str,
        now: Instant,
    ) -> Option<&'a mut StoredHash> {
        if hashes.get(key).is_some_and(|stored| stored.is_expired(now)) {
            hashes.remove(key);
        }
        hashes.get_mut(key)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryBackend {
    fn clone(&self) -> Self {
        Self {
            hashes: Arc::clone(&self.hashes),
        }
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn ping(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), SessionError> {
        let now = Instant::now();
        let mut hashes = self.hashes.write();

        if Self::live_entry(&mut hashes, key, now).is_none() {
            hashes.insert(key.to_string(), StoredHash::default());
        }
        if let Some(stored) = hashes.get_mut(key) {
            stored.fields.insert(field.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, SessionError> {
        let now = Instant::now();
        let hashes = self.hashes.read();

        Ok(hashes
            .get(key)
            .filter(|stored| !stored.is_expired(now))
            .and_then(|stored| stored.fields.get(field).cloned()))
    }

    async fn exists(&self, key: &str) -> Result<bool, SessionError> {
        let now = Instant::now();
        let hashes = self.hashes.read();
        Ok(hashes.get(key).is_some_and(|stored| !stored.is_expired(now)))
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, SessionError> {
        let now = Instant::now();
        let mut hashes = self.hashes.write();

        if Self::live_entry(&mut hashes, key, now).is_none() {
            return Ok(false);
        }
        if ttl_secs == 0 {
            // Redis deletes a key whose TTL is set to zero
            hashes.remove(key);
        } else if let Some(stored) = hashes.get_mut(key) {
            stored.expires_at = Some(now + Duration::from_secs(ttl_secs));
        }
        Ok(true)
    }

    async fn rename(&self, key: &str, new_key: &str) -> Result<(), SessionError> {
        let now = Instant::now();
        let mut hashes = self.hashes.write();

        if Self::live_entry(&mut hashes, key, now).is_none() {
            return Err(SessionError::StoreError(format!("no such key: {}", key)));
        }
        if let Some(stored) = hashes.remove(key) {
            hashes.insert(new_key.to_string(), stored);
        }
        Ok(())
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool, SessionError> {
        let now = Instant::now();
        let mut hashes = self.hashes.write();

        let Some(stored) = Self::live_entry(&mut hashes, key, now) else {
            return Ok(false);
        };
        let removed = stored.fields.remove(field).is_some();
        if stored.fields.is_empty() {
            hashes.remove(key);
        }
        Ok(removed)
    }
}
