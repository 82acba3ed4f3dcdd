//! Run configuration.
//!
//! Read from an optional JSON file; command-line flags override individual
//! fields afterwards. Every section and field has a default, so an empty
//! object (or no file at all) is a valid configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use retail_load::{LoadOptions, PostgresConfig, RetryPolicy};
use retail_model::LoadPolicy;
use retail_transform::EnrichmentOptions;
use serde::{Deserialize, Serialize};

/// Environment variable consulted for the warehouse password.
pub const PASSWORD_ENV: &str = "RETAIL_WAREHOUSE_PASSWORD";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Date patterns, globally and per extract.
    pub dates: EnrichmentOptions,
    pub load: LoadConfig,
    pub warehouse: WarehouseConfig,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            policy: self.load.policy,
            retry: self.load.retry.policy(),
            batch_timeout: self.load.batch_timeout_ms.map(Duration::from_millis),
            require_columns: self.load.require_columns,
            verify_counts: self.load.verify_counts,
            date_formats: self.dates.date_formats.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Applied to every destination table.
    pub policy: LoadPolicy,
    /// Refuse tables whose source lacks destination columns.
    pub require_columns: bool,
    /// Read row counts back after each commit.
    pub verify_counts: bool,
    pub batch_timeout_ms: Option<u64>,
    pub retry: RetryConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            policy: LoadPolicy::default(),
            require_columns: false,
            verify_counts: true,
            batch_timeout_ms: None,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: millis(policy.initial_backoff),
            max_backoff_ms: millis(policy.max_backoff),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// Warehouse connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseConfig {
    pub host: String,
    pub port: u16,
    /// Database (service) name.
    pub service: String,
    pub user: String,
    /// Prefer the environment variable over storing this in a file.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub connect_timeout_ms: u64,
    pub row_timeout_ms: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let defaults = PostgresConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            service: defaults.dbname,
            user: defaults.user,
            password: None,
            connect_timeout_ms: millis(defaults.connect_timeout),
            row_timeout_ms: millis(defaults.row_timeout),
        }
    }
}

impl WarehouseConfig {
    pub fn postgres(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.host.clone(),
            port: self.port,
            dbname: self.service.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            row_timeout: Duration::from_millis(self.row_timeout_ms),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
