//! Session store: the in-memory view of one session

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::SessionBackend;
use crate::error::SessionError;
use crate::value::{encode_values, SessionValue, SessionValues};

/// Hash field holding the serialized session map
pub const RECORD_FIELD: &str = "json";

/// Lock-protected mirror of one session's values
///
/// Every mutation is written through to the backend while the instance's
/// write lock is held. Locking is per instance: two stores read for the same
/// session ID do not coordinate, and the backend keeps whichever persisted last.
pub struct SessionStore {
    /// Session ID
    sid: String,

    /// Namespaced backend key (`prefix + sid`)
    key: String,

    /// Session values
    values: RwLock<SessionValues>,

    /// TTL in seconds applied on every persist
    max_lifetime: u64,

    backend: Arc<dyn SessionBackend>,
}

impl SessionStore {
    pub(crate) fn new(
        sid: String,
        key: String,
        values: SessionValues,
        max_lifetime: u64,
        backend: Arc<dyn SessionBackend>,
    ) -> Self {
        Self {
            sid,
            key,
            values: RwLock::new(values),
            max_lifetime,
            backend,
        }
    }

    /// Get the session ID
    pub fn session_id(&self) -> &str {
        &self.sid
    }

    /// TTL in seconds applied to the backend record on every persist
    pub fn max_lifetime(&self) -> u64 {
        self.max_lifetime
    }

    /// Set a value and persist the session
    ///
    /// Persist failures are logged, not returned.
    pub async fn set<K, V>(&self, key: K, value: V) -> Result<(), SessionError>
    where
        K: Into<String>,
        V: Into<SessionValue>,
    {
        let mut values = self.values.write().await;
        values.insert(key.into(), value.into());
        self.save_logged(&values).await;
        Ok(())
    }

    /// Set any serializable value and persist the session
    ///
    /// Fails only if `value` cannot be represented as JSON.
    pub async fn set_as<K, T>(&self, key: K, value: T) -> Result<(), SessionError>
    where
        K: Into<String>,
        T: Serialize,
    {
        let value = SessionValue::from_serialize(value)?;
        self.set(key, value).await
    }

    /// Get a value from the session
    pub async fn get(&self, key: &str) -> Option<SessionValue> {
        self.values.read().await.get(key).cloned()
    }

    /// Get a value deserialized into `T`, None if absent or of another shape
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .read()
            .await
            .get(key)
            .and_then(|v| v.deserialize().ok())
    }

    /// Remove a value and persist the session
    ///
    /// Removing an absent key is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), SessionError> {
        let mut values = self.values.write().await;
        values.remove(key);
        self.save_logged(&values).await;
        Ok(())
    }

    /// Clear all values and persist the session
    pub async fn flush(&self) -> Result<(), SessionError> {
        let mut values = self.values.write().await;
        *values = SessionValues::new();
        self.save_logged(&values).await;
        Ok(())
    }

    /// Check if a key exists in the session
    pub async fn contains(&self, key: &str) -> bool {
        self.values.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.values.read().await.keys().cloned().collect()
    }

    /// Get a copy of the session values
    pub async fn values(&self) -> SessionValues {
        self.values.read().await.clone()
    }

    /// Final persist at the end of request handling
    pub async fn release(&self) {
        let values = self.values.read().await;
        self.save_logged(&values).await;
    }

    /// Persist the session, reporting failures to the caller
    pub async fn persist(&self) -> Result<(), SessionError> {
        let values = self.values.read().await;
        self.save(&values).await
    }

    async fn save_logged(&self, values: &SessionValues) {
        if let Err(e) = self.save(values).await {
            tracing::error!(sid = %self.sid, "Failed to save session: {}", e);
        }
    }

    /// Write the whole map into the record field, then refresh the TTL.
    ///
    /// The two commands are not atomic; the next successful save restores the TTL.
    async fn save(&self, values: &SessionValues) -> Result<(), SessionError> {
        let blob = encode_values(values)?;
        self.backend.hset(&self.key, RECORD_FIELD, &blob).await?;
        self.backend.expire(&self.key, self.max_lifetime).await?;
        tracing::trace!(sid = %self.sid, bytes = blob.len(), "Session saved");
        Ok(())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("SessionStore");
        debug.field("sid", &self.sid).field("key", &self.key);
        match self.values.try_read() {
            Ok(values) => debug.field("values", &*values),
            Err(_) => debug.field("values", &"<locked>"),
        };
        debug.field("max_lifetime", &self.max_lifetime).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use async_trait::async_trait;
    use serde_json::json;

    struct UnreachableBackend;

    #[async_trait]
    impl SessionBackend for UnreachableBackend {
        async fn ping(&self) -> Result<(), SessionError> {
            Err(SessionError::ConnectionError("unreachable".into()))
        }
        async fn hset(&self, _: &str, _: &str, _: &str) -> Result<(), SessionError> {
            Err(SessionError::StoreError("unreachable".into()))
        }
        async fn hget(&self, _: &str, _: &str) -> Result<Option<String>, SessionError> {
            Err(SessionError::StoreError("unreachable".into()))
        }
        async fn exists(&self, _: &str) -> Result<bool, SessionError> {
            Err(SessionError::StoreError("unreachable".into()))
        }
        async fn expire(&self, _: &str, _: u64) -> Result<bool, SessionError> {
            Err(SessionError::StoreError("unreachable".into()))
        }
        async fn rename(&self, _: &str, _: &str) -> Result<(), SessionError> {
            Err(SessionError::StoreError("unreachable".into()))
        }
        async fn hdel(&self, _: &str, _: &str) -> Result<bool, SessionError> {
            Err(SessionError::StoreError("unreachable".into()))
        }
    }

    fn store_with(backend: Arc<dyn SessionBackend>, sid: &str) -> SessionStore {
        SessionStore::new(
            sid.to_string(),
            format!("session:{}", sid),
            SessionValues::new(),
            60,
            backend,
        )
    }

    #[tokio::test]
    async fn test_read_your_write_without_backend() {
        let store = store_with(Arc::new(UnreachableBackend), "offline");

        store.set("user", "alice").await.unwrap();
        store.set("cart", json!({"items": [1, 2]})).await.unwrap();

        assert_eq!(store.get("user").await, Some(SessionValue::from("alice")));
        assert_eq!(
            store.get("cart").await,
            Some(SessionValue::Structured(json!({"items": [1, 2]})))
        );
        assert!(store.persist().await.is_err());
        store.release().await;
    }

    #[tokio::test]
    async fn test_mutations_write_through() {
        let backend = MemoryBackend::new();
        let store = store_with(Arc::new(backend.clone()), "abc");

        store.set("views", 1i64).await.unwrap();
        let record = backend.hget("session:abc", RECORD_FIELD).await.unwrap();
        assert_eq!(record.as_deref(), Some(r#"{"views":1}"#));
        assert!(backend.ttl("session:abc").is_some());

        store.delete("views").await.unwrap();
        let record = backend.hget("session:abc", RECORD_FIELD).await.unwrap();
        assert_eq!(record.as_deref(), Some("{}"));

        // Deleting an absent key still succeeds
        store.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_flush_clears_every_key() {
        let backend = MemoryBackend::new();
        let store = store_with(Arc::new(backend.clone()), "abc");

        store.set("a", 1i64).await.unwrap();
        store.set("b", true).await.unwrap();
        store.flush().await.unwrap();

        assert_eq!(store.get("a").await, None);
        assert_eq!(store.get("b").await, None);
        assert!(store.is_empty().await);
        let record = backend.hget("session:abc", RECORD_FIELD).await.unwrap();
        assert_eq!(record.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_typed_accessors() {
        let store = store_with(Arc::new(MemoryBackend::new()), "typed");

        store.set_as("ids", vec![1u32, 2, 3]).await.unwrap();
        store.set("name", "bob").await.unwrap();

        assert_eq!(store.get_as::<Vec<u32>>("ids").await, Some(vec![1, 2, 3]));
        assert_eq!(store.get_as::<String>("name").await, Some("bob".to_string()));
        assert_eq!(store.get_as::<u32>("name").await, None);
        assert!(store.contains("ids").await);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let backend = MemoryBackend::new();
        let store = store_with(Arc::new(backend.clone()), "rel");

        store.set("k", "v").await.unwrap();
        store.release().await;
        store.release().await;

        let record = backend.hget("session:rel", RECORD_FIELD).await.unwrap();
        assert_eq!(record.as_deref(), Some(r#"{"k":"v"}"#));
    }

    #[tokio::test]
    async fn test_instances_for_same_sid_are_isolated() {
        let backend: Arc<dyn SessionBackend> = Arc::new(MemoryBackend::new());
        let first = Arc::new(store_with(Arc::clone(&backend), "shared"));
        let second = Arc::new(store_with(Arc::clone(&backend), "shared"));

        let mut handles = Vec::new();
        for i in 0..20i64 {
            let first = Arc::clone(&first);
            let second = Arc::clone(&second);
            handles.push(tokio::spawn(async move {
                first.set(format!("first-{}", i), i).await.unwrap();
                second.set(format!("second-{}", i), i).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(first.len().await, 20);
        assert_eq!(second.len().await, 20);
        assert!(first.keys().await.iter().all(|k| k.starts_with("first-")));
        assert!(second.keys().await.iter().all(|k| k.starts_with("second-")));

        // The record holds one instance's map in full
        let record = backend.hget("session:shared", RECORD_FIELD).await.unwrap().unwrap();
        let persisted = crate::value::decode_values(&record);
        assert!(persisted == first.values().await || persisted == second.values().await);
    }
}
