//! Configuration loading for logtail.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/logtail/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::LogtailError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the RocksDB record log directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Path to the Tantivy index directory
    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum records pulled from the log per batch
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Pause between consumer iterations, in milliseconds
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,

    /// Fixed wait before restarting the consumer after a fatal error
    #[serde(default = "default_restart_backoff_secs")]
    pub restart_backoff_secs: u64,

    /// Memory budget for the index writer in MB
    #[serde(default = "default_writer_memory_mb")]
    pub writer_memory_mb: usize,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "logtail")
}

fn default_db_path() -> String {
    project_dirs()
        .map(|p| p.data_local_dir().join("log"))
        .unwrap_or_else(|| PathBuf::from("./data/log"))
        .to_string_lossy()
        .to_string()
}

fn default_index_path() -> String {
    project_dirs()
        .map(|p| p.data_local_dir().join("index"))
        .unwrap_or_else(|| PathBuf::from("./data/index"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_batch_limit() -> usize {
    10_000
}

fn default_idle_interval_ms() -> u64 {
    100
}

fn default_restart_backoff_secs() -> u64 {
    20
}

fn default_writer_memory_mb() -> usize {
    50
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            index_path: default_index_path(),
            log_level: default_log_level(),
            batch_limit: default_batch_limit(),
            idle_interval_ms: default_idle_interval_ms(),
            restart_backoff_secs: default_restart_backoff_secs(),
            writer_memory_mb: default_writer_memory_mb(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/logtail/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (LOGTAIL_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, LogtailError> {
        let config_dir = project_dirs()
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| LogtailError::Config(e.to_string()))?
            .set_default("index_path", default_index_path())
            .map_err(|e| LogtailError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| LogtailError::Config(e.to_string()))?
            .set_default("batch_limit", default_batch_limit() as i64)
            .map_err(|e| LogtailError::Config(e.to_string()))?
            .set_default("idle_interval_ms", default_idle_interval_ms() as i64)
            .map_err(|e| LogtailError::Config(e.to_string()))?
            .set_default("restart_backoff_secs", default_restart_backoff_secs() as i64)
            .map_err(|e| LogtailError::Config(e.to_string()))?
            .set_default("writer_memory_mb", default_writer_memory_mb() as i64)
            .map_err(|e| LogtailError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: LOGTAIL_DB_PATH, LOGTAIL_BATCH_LIMIT, etc.
        builder = builder.add_source(
            Environment::with_prefix("LOGTAIL")
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| LogtailError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| LogtailError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the consumer cannot run with.
    pub fn validate(&self) -> Result<(), LogtailError> {
        if self.batch_limit == 0 {
            return Err(LogtailError::InvalidInput(
                "batch_limit must be > 0".to_string(),
            ));
        }
        if self.writer_memory_mb == 0 {
            return Err(LogtailError::InvalidInput(
                "writer_memory_mb must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Expand ~ in db_path to the home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }

    /// Expand ~ in index_path to the home directory
    pub fn expanded_index_path(&self) -> PathBuf {
        expand_home(&self.index_path)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(base) = directories::BaseDirs::new() {
            return base.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.batch_limit, 10_000);
        assert_eq!(settings.idle_interval_ms, 100);
        assert_eq!(settings.restart_backoff_secs, 20);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_load_with_defaults() {
        let settings = Settings::load(None).unwrap();
        assert!(settings.batch_limit > 0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logtail.toml");
        std::fs::write(&path, "batch_limit = 250\nindex_path = \"/tmp/ix\"\n").unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.batch_limit, 250);
        assert_eq!(settings.index_path, "/tmp/ix");
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let settings = Settings {
            batch_limit: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_expand_home() {
        let settings = Settings {
            db_path: "/var/lib/logtail".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.expanded_db_path(), PathBuf::from("/var/lib/logtail"));

        let settings = Settings {
            index_path: "~/ix".to_string(),
            ..Default::default()
        };
        assert!(settings.expanded_index_path().ends_with("ix"));
    }
}
