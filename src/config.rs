//! Provider configuration

use std::time::Duration;

/// Default key prefix for session records
pub const DEFAULT_PREFIX: &str = "session:";

/// Address used when the save path does not name one
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:6379";

/// Configuration for the session provider
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Redis server address as `host[:port]` (default: "127.0.0.1:6379")
    pub address: String,

    /// Redis logical database index (default: 0)
    pub database: u32,

    /// Session key prefix in the backend (default: "session:")
    pub prefix: String,

    /// Time-to-live in seconds applied to a session record on every persist
    pub max_lifetime: u64,

    /// Upper bound for a single backend command (default: None = wait forever)
    pub command_timeout: Option<Duration>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            database: 0,
            prefix: DEFAULT_PREFIX.to_string(),
            max_lifetime: 3600,
            command_timeout: None,
        }
    }
}

impl ProviderConfig {
    /// Create a configuration with the given max lifetime in seconds
    pub fn new(max_lifetime: u64) -> Self {
        Self {
            max_lifetime,
            ..Default::default()
        }
    }

    /// Build a configuration from a save path of the form `<address>[,<database-index>]`.
    ///
    /// The database index falls back to 0 when it is missing, not a number or negative.
    /// An empty address falls back to [`DEFAULT_ADDRESS`].
    pub fn from_save_path(max_lifetime: u64, save_path: &str) -> Self {
        let mut parts = save_path.split(',');

        let address = parts
            .next()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .unwrap_or(DEFAULT_ADDRESS)
            .to_string();

        let database = parts
            .next()
            .and_then(|db| db.trim().parse::<i64>().ok())
            .filter(|db| *db >= 0)
            .and_then(|db| u32::try_from(db).ok())
            .unwrap_or(0);

        Self {
            address,
            database,
            max_lifetime,
            ..Default::default()
        }
    }

    /// Set the server address
    pub fn with_address<S: Into<String>>(mut self, address: S) -> Self {
        self.address = address.into();
        self
    }

    /// Set the database index
    pub fn with_database(mut self, database: u32) -> Self {
        self.database = database;
        self
    }

    /// Set the session key prefix (default: "session:")
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set max lifetime in seconds
    pub fn with_max_lifetime(mut self, max_lifetime: u64) -> Self {
        self.max_lifetime = max_lifetime;
        self
    }

    /// Set max lifetime from Duration
    pub fn with_max_lifetime_duration(mut self, duration: Duration) -> Self {
        self.max_lifetime = duration.as_secs();
        self
    }

    /// Bound every backend command by `timeout`
    pub fn with_command_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.command_timeout = timeout.into();
        self
    }

    /// Connection URL understood by the redis client
    pub fn redis_url(&self) -> String {
        format!("redis://{}/{}", self.address, self.database)
    }

    /// Make a storage key from session ID
    pub fn make_key(&self, sid: &str) -> String {
        format!("{}{}", self.prefix, sid)
    }
}
