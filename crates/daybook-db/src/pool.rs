//! Connection pool management.

use std::env;
use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use daybook_core::{Error, Result};

/// Default maximum number of connections in the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default time to wait for a free connection, in seconds.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Pool configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a caller waits for a free connection before failing.
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load pool sizing from environment variables.
    ///
    /// Environment variables:
    /// - `DAYBOOK_DB_MAX_CONNECTIONS` (default: 10)
    /// - `DAYBOOK_DB_MIN_CONNECTIONS` (default: 1)
    /// - `DAYBOOK_DB_ACQUIRE_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(n) = env_connections("DAYBOOK_DB_MAX_CONNECTIONS")? {
            config.max_connections = n;
        }
        if let Some(n) = env_connections("DAYBOOK_DB_MIN_CONNECTIONS")? {
            config.min_connections = n;
        }
        if let Some(secs) = env_number("DAYBOOK_DB_ACQUIRE_TIMEOUT_SECS")? {
            config.acquire_timeout = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::Config("max_connections must be at least 1".into()));
        }
        if self.min_connections > self.max_connections {
            return Err(Error::Config(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

fn env_number(key: &str) -> Result<Option<u64>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", key, raw))),
        Err(_) => Ok(None),
    }
}

fn env_connections(key: &str) -> Result<Option<u32>> {
    env_number(key)?
        .map(|n| {
            u32::try_from(n)
                .map_err(|_| Error::Config(format!("{} is out of range, got {}", key, n)))
        })
        .transpose()
}

/// Create a PostgreSQL connection pool with default configuration.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

/// Create a PostgreSQL connection pool with custom configuration.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    config.validate()?;
    let start = Instant::now();

    info!(
        subsystem = "database",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        "Creating database connection pool"
    );

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout);

    if let Some(max_lifetime) = config.max_lifetime {
        options = options.max_lifetime(max_lifetime);
    }

    let pool = options
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Log pool size and idle count; warns when no connection is idle.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "database",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "database",
            component = "pool",
            pool_size = size,
            "Connection pool has no idle connections"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; tests touching them take this lock.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const POOL_VARS: [&str; 3] = [
        "DAYBOOK_DB_MAX_CONNECTIONS",
        "DAYBOOK_DB_MIN_CONNECTIONS",
        "DAYBOOK_DB_ACQUIRE_TIMEOUT_SECS",
    ];

    fn clear_pool_env() {
        for key in POOL_VARS {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_from_env_defaults_when_unset() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_pool_env();

        let config = PoolConfig::from_env().unwrap();
        assert_eq!(config, PoolConfig::default());
    }

    #[test]
    fn test_from_env_reads_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_pool_env();
        env::set_var("DAYBOOK_DB_MAX_CONNECTIONS", " 25 ");
        env::set_var("DAYBOOK_DB_MIN_CONNECTIONS", "4");
        env::set_var("DAYBOOK_DB_ACQUIRE_TIMEOUT_SECS", "7");

        let config = PoolConfig::from_env();
        clear_pool_env();
        let config = config.unwrap();
        assert_eq!(config.max_connections, 25);
        assert_eq!(config.min_connections, 4);
        assert_eq!(config.acquire_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_from_env_rejects_malformed_values() {
        let _guard = ENV_MUTEX.lock().unwrap();
        for (key, raw) in [
            ("DAYBOOK_DB_MAX_CONNECTIONS", "ten"),
            ("DAYBOOK_DB_MAX_CONNECTIONS", "-1"),
            ("DAYBOOK_DB_MIN_CONNECTIONS", "1.5"),
            ("DAYBOOK_DB_ACQUIRE_TIMEOUT_SECS", ""),
        ] {
            clear_pool_env();
            env::set_var(key, raw);
            let result = PoolConfig::from_env();
            clear_pool_env();
            assert!(
                matches!(result, Err(Error::Config(_))),
                "expected Config error for {}='{}'",
                key,
                raw
            );
        }
    }

    #[test]
    fn test_from_env_rejects_connection_counts_beyond_u32() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_pool_env();
        // 2^32 + 10 would truncate to 10 if narrowed unchecked.
        env::set_var("DAYBOOK_DB_MAX_CONNECTIONS", "4294967306");

        let result = PoolConfig::from_env();
        clear_pool_env();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("out of range")));
    }

    #[test]
    fn test_from_env_validates_bounds() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_pool_env();
        env::set_var("DAYBOOK_DB_MAX_CONNECTIONS", "2");
        env::set_var("DAYBOOK_DB_MIN_CONNECTIONS", "5");

        let result = PoolConfig::from_env();
        clear_pool_env();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::new()
            .max_connections(20)
            .min_connections(5)
            .acquire_timeout(Duration::from_secs(60))
            .max_lifetime(None);

        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 5);
        assert_eq!(config.acquire_timeout, Duration::from_secs(60));
        assert_eq!(config.max_lifetime, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let config = PoolConfig::new().max_connections(2).min_connections(3);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(PoolConfig::new().max_connections(0).validate().is_err());
    }
}
