//! Reporting configuration.
//!
//! Every field has a serde default so a partial TOML file (or none at all)
//! yields a working setup. Environment and version fall back to the
//! `APP_ENV` / `APP_VERSION` variables when not set explicitly.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Where the reporting code is running. Decides the fallback category for
/// unclassified errors and whether page context gets stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    Client,
    Server,
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::Server
    }
}

/// Error reporting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Accept errors through the client entrypoint
    #[serde(default = "default_true")]
    pub enable_client_logging: bool,

    /// Accept errors through the server entrypoint
    #[serde(default = "default_true")]
    pub enable_server_logging: bool,

    /// Mirror captured errors to the process log
    #[serde(default = "default_true")]
    pub enable_console_logging: bool,

    /// Buffer captured errors for the remote store
    #[serde(default = "default_true")]
    pub enable_database_logging: bool,

    /// Records per flush batch; reaching this many queued triggers a flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Background flush period in milliseconds
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Re-queue budget per record after a failed flush
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Queue bound; the oldest record is dropped on overflow
    #[serde(default = "default_max_queue")]
    pub max_queue: usize,

    /// Deploy environment stamped onto records
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Application version stamped onto records
    #[serde(default = "default_version")]
    pub version: Option<String>,

    #[serde(default)]
    pub runtime: Runtime,
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    10
}

fn default_flush_interval_ms() -> u64 {
    5_000 // 5 seconds
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_queue() -> usize {
    1_000
}

fn default_environment() -> String {
    std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string())
}

fn default_version() -> Option<String> {
    std::env::var("APP_VERSION").ok()
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            enable_client_logging: default_true(),
            enable_server_logging: default_true(),
            enable_console_logging: default_true(),
            enable_database_logging: default_true(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            max_retries: default_max_retries(),
            max_queue: default_max_queue(),
            environment: default_environment(),
            version: default_version(),
            runtime: Runtime::default(),
        }
    }
}

impl ReportingConfig {
    /// Flush period as a `Duration`.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Load config from a TOML file. Missing fields take their defaults;
    /// the parsed config is validated before it is returned.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let config: ReportingConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config from {}", path.display()))?;
        config.validate()?;
        info!("Loaded reporting config from {}", path.display());
        Ok(config)
    }

    /// Reject values that cannot drive the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be greater than zero");
        }
        if self.flush_interval_ms == 0 {
            bail!("flush_interval_ms must be greater than zero");
        }
        if self.max_queue == 0 {
            bail!("max_queue must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ReportingConfig::default();
        assert!(config.enable_client_logging);
        assert!(config.enable_database_logging);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.flush_interval_ms, 5_000);
        assert_eq!(config.flush_interval(), Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_queue, 1_000);
        assert_eq!(config.runtime, Runtime::Server);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
batch_size = 25
flush_interval_ms = 250
environment = "staging"
runtime = "client"
"#;
        let config: ReportingConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.flush_interval_ms, 250);
        assert_eq!(config.environment, "staging");
        assert_eq!(config.runtime, Runtime::Client);
        // Defaults for missing fields
        assert!(config.enable_console_logging);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "batch_size = 2\nenvironment = \"test\"").unwrap();
        let config = ReportingConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.environment, "test");
    }

    #[test]
    fn test_load_rejects_zero_batch_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "batch_size = 0").unwrap();
        let err = ReportingConfig::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(ReportingConfig::load_from_path("/nonexistent/reporting.toml").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = ReportingConfig {
            flush_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
