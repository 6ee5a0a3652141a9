//! Session backend implementations

mod memory;
mod traits;

pub use memory::MemoryBackend;
pub use traits::SessionBackend;

#[cfg(feature = "redis-store")]
mod redis_backend;

#[cfg(feature = "redis-store")]
pub use redis_backend::RedisBackend;
