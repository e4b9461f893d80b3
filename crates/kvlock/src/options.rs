//! Lock options and configuration loading
//!
//! `LockOptions` is what lock constructors take. `LockConfig` is its
//! serializable form, loaded from an optional config file and `KVLOCK_*`
//! environment variables:
//!
//! | Key                     | Env var                        | Default |
//! |-------------------------|--------------------------------|---------|
//! | `ttl_ms`                | `KVLOCK_TTL_MS`                | 30000   |
//! | `retry_interval_ms`     | `KVLOCK_RETRY_INTERVAL_MS`     | 100     |
//! | `max_retry_interval_ms` | `KVLOCK_MAX_RETRY_INTERVAL_MS` | (interval) |
//! | `retry_multiplier`      | `KVLOCK_RETRY_MULTIPLIER`      | 1.0     |
//! | `retry_jitter_ms`       | `KVLOCK_RETRY_JITTER_MS`       | 0       |

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{LockError, Result};
use crate::retry::{DEFAULT_RETRY_INTERVAL, RetryPolicy};

/// Reference lease duration before a lock entry auto-expires
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

const ENV_PREFIX: &str = "KVLOCK";

/// Runtime options shared by all lock types
#[derive(Debug, Clone, PartialEq)]
pub struct LockOptions {
    /// Lease duration of a held entry
    pub ttl: Duration,
    /// Delay schedule between acquisition attempts
    pub retry: RetryPolicy,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            retry: RetryPolicy::default(),
        }
    }
}

impl LockOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set a fixed retry interval, keeping any configured jitter
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry = RetryPolicy::fixed(interval).with_jitter(self.retry.jitter);
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.retry.jitter = jitter;
        self
    }

    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.retry = self.retry.with_backoff(multiplier, max_interval);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(LockError::InvalidConfig("ttl must be positive".to_string()));
        }
        if self.retry.interval.is_zero() {
            return Err(LockError::InvalidConfig(
                "retry interval must be positive".to_string(),
            ));
        }
        if !(self.retry.multiplier >= 1.0 && self.retry.multiplier.is_finite()) {
            return Err(LockError::InvalidConfig(format!(
                "retry multiplier must be a finite value >= 1.0, got {}",
                self.retry.multiplier
            )));
        }
        if self.retry.max_interval < self.retry.interval {
            return Err(LockError::InvalidConfig(
                "max retry interval must not be below the retry interval".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serializable lock configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub ttl_ms: u64,
    pub retry_interval_ms: u64,
    /// Defaults to `retry_interval_ms` (no backoff growth)
    pub max_retry_interval_ms: Option<u64>,
    pub retry_multiplier: f64,
    pub retry_jitter_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL.as_millis() as u64,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL.as_millis() as u64,
            max_retry_interval_ms: None,
            retry_multiplier: 1.0,
            retry_jitter_ms: 0,
        }
    }
}

impl LockConfig {
    /// Load from an optional file, then `KVLOCK_*` environment overrides
    ///
    /// The file format is picked from its extension (toml, yaml, json, ...).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        builder
            .build()
            .and_then(|c| c.try_deserialize::<LockConfig>())
            .map_err(|e| LockError::InvalidConfig(e.to_string()))
    }
}

impl TryFrom<LockConfig> for LockOptions {
    type Error = LockError;

    fn try_from(value: LockConfig) -> Result<Self> {
        let interval = Duration::from_millis(value.retry_interval_ms);
        let max_interval = value
            .max_retry_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(interval);

        let options = LockOptions {
            ttl: Duration::from_millis(value.ttl_ms),
            retry: RetryPolicy::fixed(interval)
                .with_backoff(value.retry_multiplier, max_interval)
                .with_jitter(Duration::from_millis(value.retry_jitter_ms)),
        };
        options.validate()?;
        Ok(options)
    }
}
