//! Engine configuration shared by the annotation and insights services.

use std::env;
use std::time::Duration;

use chrono_tz::Tz;

use crate::day_boundary::parse_timezone;
use crate::defaults::{DEFAULT_TIMEZONE, MAX_HEATMAP_DAYS, STORE_TIMEOUT_MS};
use crate::error::{Error, Result};

/// Runtime settings for the services.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeout applied to each store call. Expiry surfaces as `Error::Timeout`.
    pub store_timeout: Duration,
    /// Timezone for owners without a usable preference.
    pub default_timezone: Tz,
    /// Largest number of day buckets a heatmap request may span.
    pub max_heatmap_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(STORE_TIMEOUT_MS),
            default_timezone: Tz::UTC,
            max_heatmap_days: MAX_HEATMAP_DAYS,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DAYBOOK_STORE_TIMEOUT_MS` (default: 5000)
    /// - `DAYBOOK_DEFAULT_TIMEZONE` (default: "UTC")
    /// - `DAYBOOK_MAX_HEATMAP_DAYS` (default: 1830)
    ///
    /// Unset variables take their defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = env::var("DAYBOOK_STORE_TIMEOUT_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!("DAYBOOK_STORE_TIMEOUT_MS must be an integer, got '{}'", raw))
            })?;
            config.store_timeout = Duration::from_millis(ms);
        }

        let tz_name = env::var("DAYBOOK_DEFAULT_TIMEZONE")
            .unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
        config.default_timezone =
            parse_timezone(&tz_name).map_err(|e| Error::Config(e.to_string()))?;

        if let Ok(raw) = env::var("DAYBOOK_MAX_HEATMAP_DAYS") {
            config.max_heatmap_days = raw.trim().parse().map_err(|_| {
                Error::Config(format!("DAYBOOK_MAX_HEATMAP_DAYS must be an integer, got '{}'", raw))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_default_timezone(mut self, tz: Tz) -> Self {
        self.default_timezone = tz;
        self
    }

    pub fn with_max_heatmap_days(mut self, days: i64) -> Self {
        self.max_heatmap_days = days;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.store_timeout.is_zero() {
            return Err(Error::Config("store timeout must be non-zero".into()));
        }
        if self.max_heatmap_days < 1 {
            return Err(Error::Config("max heatmap days must be at least 1".into()));
        }
        Ok(())
    }
}
