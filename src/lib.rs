//! # hredis-session
//!
//! TTL-bounded session storage kept in Redis hashes.
//!
//! Each session lives under `prefix + session_id` (default prefix `session:`)
//! as a single hash field `json` holding the whole key/value map. Every
//! mutation is written through immediately and refreshes the key's TTL, so
//! expiry is entirely the backend's job.
//!
//! ## Features
//!
//! - **Write-through stores**: `set`, `delete` and `flush` persist under the store's own lock
//! - **Identifier rotation**: `regenerate` renames a session atomically or seeds an empty one
//! - **Raw structured values**: objects and arrays read back byte for byte as JSON fragments
//! - **Pluggable backends**: Redis, Memory, or custom implementations of [`SessionBackend`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hredis_session::SessionProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hredis_session::SessionError> {
//!     // "<address>[,<database-index>]"
//!     let provider = SessionProvider::init(3600, "127.0.0.1:6379,1").await?;
//!
//!     let session = provider.read("some-sid").await?;
//!     let views = session.get_as::<i64>("views").await.unwrap_or(0);
//!     session.set("views", views + 1).await?;
//!
//!     // Rotate the identifier after login
//!     let session = provider.regenerate("some-sid", "new-sid").await?;
//!     session.release().await;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod provider;
pub mod session;
pub mod value;

pub use backend::{MemoryBackend, SessionBackend};
pub use config::ProviderConfig;
pub use error::SessionError;
pub use provider::SessionProvider;
pub use session::SessionStore;
pub use value::{SessionValue, SessionValues};

#[cfg(feature = "redis-store")]
pub use backend::RedisBackend;
