//! Configuration loading and validation.
//!
//! Values come from an optional TOML file, then `COMPLETION__`-prefixed
//! environment variables (`COMPLETION__PIPELINE__WORKERS=4`), then defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::FetcherConfig;
use crate::storage::StorageConfig;
use crate::sync::pipeline::FetchPipeline;
use crate::sync::records::DEFAULT_API_BASE;
use crate::sync::SchedulerConfig;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "COMPLETION";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Remote completion-data service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout for the HTTP client
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("tempus-completion/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Fetch pipeline sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,

    /// Results still outstanding after this long are abandoned
    #[serde(default = "default_batch_deadline")]
    pub batch_deadline_seconds: u64,
}

fn default_workers() -> usize {
    8
}

fn default_batch_deadline() -> u64 {
    300
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            request_timeout_seconds: default_timeout(),
            batch_deadline_seconds: default_batch_deadline(),
        }
    }
}

/// Refresh cadence and batch sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Idle sleep, and the base of the failure backoff
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    #[serde(default = "default_max_age_hours")]
    pub zone_max_age_hours: u64,

    #[serde(default = "default_max_age_hours")]
    pub catalog_max_age_hours: u64,

    #[serde(default = "default_stale_zone_batch")]
    pub stale_zone_batch: usize,

    #[serde(default = "default_stale_player_map_batch")]
    pub stale_player_map_batch: usize,
}

fn default_interval() -> u64 {
    60
}

fn default_max_age_hours() -> u64 {
    24
}

fn default_stale_zone_batch() -> usize {
    5
}

fn default_stale_player_map_batch() -> usize {
    10_000
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            zone_max_age_hours: default_max_age_hours(),
            catalog_max_age_hours: default_max_age_hours(),
            stale_zone_batch: default_stale_zone_batch(),
            stale_player_map_batch: default_stale_player_map_batch(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            api: ApiConfig::default(),
            pipeline: PipelineConfig::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file plus environment overrides.
    ///
    /// A missing file is not an error; defaults fill in whatever is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "API timeout must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.workers == 0 {
            return Err(ConfigError::Validation(
                "Pipeline needs at least one worker".to_string(),
            ));
        }

        if self.pipeline.request_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.batch_deadline_seconds < self.pipeline.request_timeout_seconds {
            return Err(ConfigError::Validation(format!(
                "Batch deadline ({}s) is shorter than the request timeout ({}s)",
                self.pipeline.batch_deadline_seconds, self.pipeline.request_timeout_seconds
            )));
        }

        if self.scheduler.interval_seconds == 0 {
            return Err(ConfigError::Validation(
                "Scheduler interval must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.stale_zone_batch == 0 || self.scheduler.stale_player_map_batch == 0 {
            return Err(ConfigError::Validation(
                "Stale batch sizes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the default configuration to `path`, creating parent directories.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, AppConfig::default().to_toml()?)?;
        Ok(())
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeout: Duration::from_secs(self.api.timeout_seconds),
            user_agent: self.api.user_agent.clone(),
        }
    }

    pub fn pipeline(&self) -> FetchPipeline {
        FetchPipeline::new(
            self.pipeline.workers,
            Duration::from_secs(self.pipeline.request_timeout_seconds),
            Duration::from_secs(self.pipeline.batch_deadline_seconds),
        )
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::new(self.data_dir.clone())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let settings = &self.scheduler;
        SchedulerConfig {
            interval: Duration::from_secs(settings.interval_seconds),
            zone_max_age: chrono::Duration::hours(settings.zone_max_age_hours as i64),
            catalog_max_age: chrono::Duration::hours(settings.catalog_max_age_hours as i64),
            stale_zone_batch: settings.stale_zone_batch,
            stale_player_map_batch: settings.stale_player_map_batch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.api.base_url, "https://tempus2.xyz/api/v0");
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.pipeline.batch_deadline_seconds, 300);
        assert_eq!(config.scheduler.stale_zone_batch, 5);
        assert_eq!(config.scheduler.stale_player_map_batch, 10_000);
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_workers() {
        let mut config = AppConfig::default();
        config.pipeline.workers = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_deadline_shorter_than_request() {
        let mut config = AppConfig::default();
        config.pipeline.batch_deadline_seconds = 5;

        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_config_validation_zero_batch() {
        let mut config = AppConfig::default();
        config.scheduler.stale_zone_batch = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::load(&temp_dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.scheduler.interval_seconds, 60);
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("completion.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/var/lib/completion"

[pipeline]
workers = 3
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/completion"));
        assert_eq!(config.pipeline.workers, 3);
        assert_eq!(config.pipeline.request_timeout_seconds, 10);
        assert_eq!(config.scheduler.zone_max_age_hours, 24);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("completion.toml");
        std::fs::write(&path, "[pipeline]\nworkers = 0\n").unwrap();

        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_environment_override() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var("COMPLETION__API__USER_AGENT", "completion-test/1");

        let config = AppConfig::load(&temp_dir.path().join("absent.toml")).unwrap();
        std::env::remove_var("COMPLETION__API__USER_AGENT");

        assert_eq!(config.api.user_agent, "completion-test/1");
    }

    #[test]
    fn test_write_default_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("completion.toml");

        AppConfig::write_default(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(loaded.data_dir, defaults.data_dir);
        assert_eq!(loaded.pipeline, defaults.pipeline);
        assert_eq!(loaded.scheduler, defaults.scheduler);
    }

    #[test]
    fn test_scheduler_config_conversion() {
        let config = AppConfig::default().scheduler_config();

        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.zone_max_age, chrono::Duration::hours(24));
        assert_eq!(config.stale_zone_batch, 5);
    }
}
