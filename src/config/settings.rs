//! Application settings loading from config.toml
//!
//! Every field has a default, so an absent file or a file that only sets a few keys
//! is valid. `DATABASE_URL` in the environment takes precedence over `database_url`.

use crate::config::database::{DEFAULT_DATABASE_URL, get_database_url};
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming an alternative settings file.
pub const CONFIG_PATH_ENV: &str = "FINTRACK_CONFIG";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// `SeaORM` connection URL
    pub database_url: String,
    /// Daily sweep scheduling
    pub scheduler: SchedulerConfig,
    /// Background job worker tuning
    pub worker: WorkerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            scheduler: SchedulerConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

/// How often the scheduler checks whether today's sweep still has to run.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between sweep attempts
    pub check_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
        }
    }
}

impl SchedulerConfig {
    /// Check interval as a [`Duration`], never shorter than one second.
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

/// Polling and retry settings for the background job worker.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Seconds between worker ticks
    pub poll_interval_secs: u64,
    /// How long a leased job stays claimed before other workers may reclaim it
    pub lease_secs: u64,
    /// Lease count after which a failing job is marked `failed`
    pub max_attempts: i32,
    /// Maximum number of jobs leased per tick
    pub batch_size: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            lease_secs: 300,
            max_attempts: 5,
            batch_size: 10,
        }
    }
}

impl WorkerConfig {
    /// Poll interval as a [`Duration`], never shorter than one second.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Lease length as a [`chrono::Duration`].
    #[must_use]
    pub fn lease(&self) -> chrono::Duration {
        let secs = i64::try_from(self.lease_secs).unwrap_or(i64::MAX);
        chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
    }
}

/// Parses settings from a TOML string.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads the application settings the way the binary does.
///
/// Reads `$FINTRACK_CONFIG` or `./config.toml`; a missing file falls back to defaults.
/// `DATABASE_URL` overrides the configured database in either case.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
    let mut config = if Path::new(&path).exists() {
        tracing::debug!("Loading configuration from {path}");
        load_config(&path)?
    } else {
        tracing::info!("No configuration file at {path}, using defaults");
        AppConfig::default()
    };
    config.database_url = get_database_url(&config.database_url);
    Ok(config)
}
