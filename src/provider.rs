//! Session provider: lifecycle of sessions against the backend

use std::sync::Arc;

use crate::backend::SessionBackend;
#[cfg(feature = "redis-store")]
use crate::backend::RedisBackend;
use crate::config::ProviderConfig;
use crate::error::SessionError;
use crate::session::{SessionStore, RECORD_FIELD};
use crate::value::{decode_values, SessionValues};

/// Maps session IDs to [`SessionStore`]s and owns the backend connection
///
/// The backend is shared by the provider and every store it hands out.
pub struct SessionProvider {
    backend: Arc<dyn SessionBackend>,
    config: ProviderConfig,
}

impl SessionProvider {
    /// Connect to Redis from a save path of the form `<address>[,<database-index>]`
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let provider = SessionProvider::init(3600, "127.0.0.1:6379,1").await?;
    /// ```
    #[cfg(feature = "redis-store")]
    pub async fn init(max_lifetime: u64, save_path: &str) -> Result<Self, SessionError> {
        Self::connect(ProviderConfig::from_save_path(max_lifetime, save_path)).await
    }

    /// Connect to Redis using a full configuration
    #[cfg(feature = "redis-store")]
    pub async fn connect(config: ProviderConfig) -> Result<Self, SessionError> {
        let backend = RedisBackend::from_config(&config)
            .await
            .map_err(into_connection_error)?;
        Self::with_backend(backend, config).await
    }

    /// Create a provider over any backend, verifying it answers a ping
    pub async fn with_backend<B: SessionBackend>(
        backend: B,
        config: ProviderConfig,
    ) -> Result<Self, SessionError> {
        Self::from_shared(Arc::new(backend), config).await
    }

    /// Create a provider over an already shared backend, verifying it answers a ping
    pub async fn from_shared(
        backend: Arc<dyn SessionBackend>,
        config: ProviderConfig,
    ) -> Result<Self, SessionError> {
        backend.ping().await.map_err(into_connection_error)?;
        tracing::debug!(
            address = %config.address,
            database = config.database,
            prefix = %config.prefix,
            max_lifetime = config.max_lifetime,
            "Session provider initialized"
        );
        Ok(Self { backend, config })
    }

    /// Get the provider configuration
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Get the shared backend
    pub fn backend(&self) -> Arc<dyn SessionBackend> {
        Arc::clone(&self.backend)
    }

    /// Load a session
    ///
    /// A missing, empty or unreadable record yields an empty session.
    pub async fn read(&self, sid: &str) -> Result<SessionStore, SessionError> {
        let key = self.config.make_key(sid);

        let values = match self.backend.hget(&key, RECORD_FIELD).await {
            Ok(Some(blob)) => decode_values(&blob),
            Ok(None) => SessionValues::new(),
            Err(e) => {
                tracing::warn!(sid = %sid, "Failed to load session, starting empty: {}", e);
                SessionValues::new()
            }
        };

        Ok(SessionStore::new(
            sid.to_string(),
            key,
            values,
            self.config.max_lifetime,
            Arc::clone(&self.backend),
        ))
    }

    /// Check whether a session record exists
    ///
    /// Backend failures count as absence.
    pub async fn exists(&self, sid: &str) -> bool {
        match self.backend.exists(&self.config.make_key(sid)).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(sid = %sid, "Failed to check session existence: {}", e);
                false
            }
        }
    }

    /// Move a session to a new ID
    ///
    /// If `old_sid` has no record, an empty record is created for `sid`;
    /// otherwise the old record is renamed. The new record's TTL is refreshed
    /// either way and the session is read back under its new ID.
    ///
    /// Unlike [`read`](Self::read), this can fail: a failed seed or rename is
    /// returned, e.g. when the old key expires between the existence check
    /// and the rename.
    pub async fn regenerate(&self, old_sid: &str, sid: &str) -> Result<SessionStore, SessionError> {
        let old_key = self.config.make_key(old_sid);
        let new_key = self.config.make_key(sid);

        if self.exists(old_sid).await {
            self.backend.rename(&old_key, &new_key).await?;
            tracing::debug!(old_sid = %old_sid, sid = %sid, "Session renamed");
        } else {
            self.backend.hset(&new_key, RECORD_FIELD, "").await?;
            tracing::debug!(old_sid = %old_sid, sid = %sid, "Session seeded");
        }

        if let Err(e) = self.backend.expire(&new_key, self.config.max_lifetime).await {
            tracing::error!(sid = %sid, "Failed to refresh session TTL: {}", e);
        }

        self.read(sid).await
    }

    /// Delete a session record
    pub async fn destroy(&self, sid: &str) -> Result<(), SessionError> {
        self.backend
            .hdel(&self.config.make_key(sid), RECORD_FIELD)
            .await?;
        tracing::debug!(sid = %sid, "Session destroyed");
        Ok(())
    }

    /// Expiry is left to the backend TTL; nothing to sweep
    pub fn gc(&self) {
        tracing::trace!("Session gc requested, expiry is handled by the backend TTL");
    }

    /// Number of active sessions
    ///
    /// Always 0: active sessions are not counted.
    pub fn count(&self) -> usize {
        0
    }
}

impl Clone for SessionProvider {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
        }
    }
}

impl std::fmt::Debug for SessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionProvider")
            .field("config", &self.config)
            .finish()
    }
}

fn into_connection_error(err: SessionError) -> SessionError {
    match err {
        SessionError::ConnectionError(_) => err,
        other => SessionError::ConnectionError(other.to_string()),
    }
}
