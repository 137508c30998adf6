use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    database::DatabaseConfig,
    platform::{PlatformConfig, SummaryConfig},
    queue::{LockConfig, QueueConfig},
    sync::{AutoSyncConfig, WorkerConfig},
};

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub lock: LockConfig,
    pub platform: PlatformConfig,
    pub auto_sync: AutoSyncConfig,
    pub worker: WorkerConfig,
    pub summary: SummaryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            queue: QueueConfig::default(),
            lock: LockConfig::default(),
            platform: PlatformConfig::default(),
            auto_sync: AutoSyncConfig::default(),
            worker: WorkerConfig::default(),
            summary: SummaryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: ROOMSYNC_, nested keys
    ///    separated by `__`, e.g. `ROOMSYNC_DATABASE__URL`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();
        builder = Self::set_defaults(builder)?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("config file not found: {}", path));
            }
        } else {
            let default_paths = [
                "config/roomsync.toml",
                "roomsync.toml",
                "/etc/roomsync/config.toml",
            ];

            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("ROOMSYNC")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = AppConfig::default();
        let builder = builder
            .set_default("database.url", defaults.database.url)?
            .set_default("database.max_connections", defaults.database.max_connections)?
            .set_default("database.min_connections", defaults.database.min_connections)?
            .set_default(
                "database.connection_timeout_seconds",
                defaults.database.connection_timeout_seconds,
            )?
            .set_default(
                "database.idle_timeout_seconds",
                defaults.database.idle_timeout_seconds,
            )?
            .set_default("queue.enabled", defaults.queue.enabled)?
            .set_default("queue.backend", "memory")?
            .set_default("queue.url", defaults.queue.url)?
            .set_default("queue.job_queue", defaults.queue.job_queue)?
            .set_default(
                "queue.connection_timeout_seconds",
                defaults.queue.connection_timeout_seconds,
            )?
            .set_default("lock.redis_url", defaults.lock.redis_url)?
            .set_default("lock.key_prefix", defaults.lock.key_prefix)?
            .set_default("platform.base_url", defaults.platform.base_url)?
            .set_default("platform.timeout_seconds", defaults.platform.timeout_seconds)?
            .set_default("platform.max_retries", defaults.platform.max_retries)?
            .set_default("auto_sync.enabled", defaults.auto_sync.enabled)?
            .set_default(
                "auto_sync.interval_seconds",
                defaults.auto_sync.interval_seconds,
            )?
            .set_default(
                "auto_sync.trigger_room_cap",
                defaults.auto_sync.trigger_room_cap as u64,
            )?
            .set_default("worker.enabled", defaults.worker.enabled)?
            .set_default(
                "worker.max_concurrent_jobs",
                defaults.worker.max_concurrent_jobs as u64,
            )?
            .set_default(
                "worker.poll_interval_seconds",
                defaults.worker.poll_interval_seconds,
            )?
            .set_default("summary.base_url", defaults.summary.base_url)?
            .set_default("summary.model", defaults.summary.model)?
            .set_default("summary.timeout_seconds", defaults.summary.timeout_seconds)?;

        Ok(builder)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("failed to parse TOML config")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config to TOML")
    }

    /// Validate every configuration section
    pub fn validate(&self) -> Result<()> {
        self.database
            .validate()
            .context("database configuration invalid")?;
        self.queue.validate().context("queue configuration invalid")?;
        self.lock.validate().context("lock configuration invalid")?;
        self.platform
            .validate()
            .context("platform configuration invalid")?;
        self.auto_sync
            .validate()
            .context("auto_sync configuration invalid")?;
        self.worker
            .validate()
            .context("worker configuration invalid")?;
        self.summary
            .validate()
            .context("summary configuration invalid")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_load_and_validate() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.queue.backend, super::super::queue::QueueBackend::Memory);
        assert!(!config.auto_sync.enabled);
        assert!(!config.platform.credentials_configured());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roomsync.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[database]
url = "postgresql://db.internal/roomsync"

[auto_sync]
enabled = true
interval_seconds = 120
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.database.url, "postgresql://db.internal/roomsync");
        assert!(config.auto_sync.enabled);
        assert_eq!(config.auto_sync.interval_seconds, 120);
        // untouched sections keep their defaults
        assert_eq!(config.worker.max_concurrent_jobs, 4);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = AppConfig::load(Some("/nonexistent/roomsync.toml")).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn toml_rendering_is_reloadable() {
        let mut config = AppConfig::default();
        config.auto_sync.interval_seconds = 900;

        let rendered = config.to_toml().unwrap();
        let reloaded = AppConfig::from_toml(&rendered).unwrap();
        assert_eq!(reloaded.auto_sync.interval_seconds, 900);

        assert!(AppConfig::from_toml("queue = \"not a table\"").is_err());
    }

    #[test]
    fn validate_rejects_bad_database_url() {
        let config = AppConfig {
            database: DatabaseConfig {
                url: "mysql://localhost/roomsync".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
