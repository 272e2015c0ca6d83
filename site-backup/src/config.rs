//! Configuration management for the backup pipeline.
//!
//! Loads configuration from a TOML file with `SITE_BACKUP__<SECTION>__<KEY>`
//! environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::errors::{BackupError, Result};

const ENV_PREFIX: &str = "SITE_BACKUP";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Parent directory for per-operation extraction directories
    /// (None = system temp dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,

    /// Buffer size for streamed copies in bytes (default: 64KB)
    #[serde(default = "default_copy_buffer_size")]
    pub copy_buffer_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Compression level for zip and tar.gz archives (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// WP-CLI executable
    #[serde(default = "default_wp_cli")]
    pub wp_cli: String,

    /// Database driver of the local sites (sqlite, mysql)
    #[serde(default)]
    pub database_driver: DatabaseDriver,

    /// Extra arguments appended to every WP-CLI invocation
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_copy_buffer_size() -> usize {
    64 * 1024
}

fn default_compression_level() -> u32 {
    9
}

fn default_wp_cli() -> String {
    "wp".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            copy_buffer_size: default_copy_buffer_size(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            wp_cli: default_wp_cli(),
            database_driver: DatabaseDriver::default(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::load(Some(path))
    }

    /// Load defaults plus environment overrides, without a file
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path.to_path_buf()).format(config::FileFormat::Toml),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| BackupError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.export.compression_level > 9 {
            return Err(BackupError::Config(format!(
                "export.compression_level must be between 0 and 9, got {}",
                self.export.compression_level
            )));
        }
        if self.import.copy_buffer_size == 0 {
            return Err(BackupError::Config(
                "import.copy_buffer_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Render this configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BackupError::Config(e.to_string()))
    }

    /// Parent directory for extraction directories
    pub fn temp_root(&self) -> PathBuf {
        self.import
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
