//! Redis session provider example
//!
//! Walks one session through its lifecycle against a local Redis:
//! write, read back, rotate the identifier, destroy.
//!
//! Run with: cargo run --example with_redis -- 127.0.0.1:6379,0

use hredis_session::{SessionError, SessionProvider};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Cart {
    items: Vec<String>,
    total_cents: u64,
}

#[tokio::main]
async fn main() -> Result<(), SessionError> {
    tracing_subscriber::fmt::init();

    let save_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:6379,0".to_string());
    let provider = SessionProvider::init(600, &save_path).await?;

    let sid = uuid::Uuid::new_v4().to_string();
    let session = provider.read(&sid).await?;
    session.set("user", "alice").await?;
    session.set("visits", 1i64).await?;
    session
        .set_as(
            "cart",
            Cart {
                items: vec!["book".to_string()],
                total_cents: 1299,
            },
        )
        .await?;

    let reloaded = provider.read(&sid).await?;
    println!("user   = {:?}", reloaded.get("user").await);
    println!("visits = {:?}", reloaded.get_as::<i64>("visits").await);
    println!("cart   = {:?}", reloaded.get_as::<Cart>("cart").await);

    let new_sid = uuid::Uuid::new_v4().to_string();
    let rotated = provider.regenerate(&sid, &new_sid).await?;
    println!(
        "rotated {} -> {} (old exists: {}, keys: {:?})",
        sid,
        rotated.session_id(),
        provider.exists(&sid).await,
        rotated.keys().await
    );
    rotated.release().await;

    provider.destroy(&new_sid).await?;
    println!("destroyed, exists: {}", provider.exists(&new_sid).await);
    Ok(())
}
