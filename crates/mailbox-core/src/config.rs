//! Process configuration.
//!
//! Loaded once at startup and passed by reference; nothing reads the
//! environment after that.
//!
//! Priority (highest first):
//! 1. Environment variables (`gateway_url`, `port`, ... matched case-insensitively)
//! 2. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::error::MailboxError;
use crate::queue::{DEFAULT_CAPACITY, RetryPolicy};

const ENV_KEYS: &[&str] = &[
    "gateway_url",
    "host",
    "port",
    "tick_interval_ms",
    "relay_timeout_secs",
    "queue_capacity",
    "enforce_max_retries",
    "log_json",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the downstream gateway.
    pub gateway_url: String,
    /// Admission listener address.
    pub host: String,
    pub port: u16,
    /// Scheduler period. Should not exceed the smallest restart delay callers use.
    pub tick_interval_ms: u64,
    /// Upper bound on one relay attempt.
    pub relay_timeout_secs: u64,
    /// Admission is refused (503) once this many items are queued.
    pub queue_capacity: usize,
    /// Drop requests once `retries >= max_retries` (when `max_retries > 0`).
    pub enforce_max_retries: bool,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: "http://gateway:8080".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            tick_interval_ms: 1_000,
            relay_timeout_secs: 10,
            queue_capacity: DEFAULT_CAPACITY,
            enforce_max_retries: true,
            log_json: false,
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment.
    pub fn load() -> Result<Self, MailboxError> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default())).merge(Env::raw().only(ENV_KEYS)),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, MailboxError> {
        let config: Config = figment
            .extract()
            .map_err(|e| MailboxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MailboxError> {
        if self.gateway_url.trim().is_empty() {
            return Err(MailboxError::Config("gateway_url must not be empty".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(MailboxError::Config("tick_interval_ms must be > 0".into()));
        }
        if self.relay_timeout_secs == 0 {
            return Err(MailboxError::Config("relay_timeout_secs must be > 0".into()));
        }
        if self.queue_capacity == 0 {
            return Err(MailboxError::Config("queue_capacity must be > 0".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            enforce_max_retries: self.enforce_max_retries,
        }
    }
}
