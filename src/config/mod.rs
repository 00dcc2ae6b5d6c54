//! Configuration management for simcache

pub mod schema;

pub use schema::{AnalyzerConfig, CompressionConfig, Config, PathsConfig, PipelineConfig};

use crate::error::{SimcacheError, SimcacheResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Name of the project-local config file
pub const LOCAL_CONFIG_NAME: &str = ".simcache.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("simcache")
            .join("config.toml")
    }

    /// Find `.simcache.toml` in `start` or any of its ancestors
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> SimcacheResult<Config> {
        self.load_merged(None).await
    }

    /// Load the global config with an optional local file layered on top
    ///
    /// Tables are merged key by key; local values win.
    pub async fn load_merged(&self, local: Option<&Path>) -> SimcacheResult<Config> {
        let mut merged = toml::Table::new();

        if self.config_path.exists() {
            merged = read_table(&self.config_path).await?;
        } else {
            debug!("Config file not found, using defaults");
        }

        if let Some(local) = local {
            debug!("Layering local config {}", local.display());
            merge_tables(&mut merged, read_table(local).await?);
        }

        let origin = local.unwrap_or(self.config_path.as_path());
        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| SimcacheError::ConfigInvalid {
                path: origin.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> SimcacheResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            SimcacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> SimcacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SimcacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_table(path: &Path) -> SimcacheResult<toml::Table> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| SimcacheError::io(format!("reading config from {}", path.display()), e))?;

    toml::from_str::<toml::Table>(&content).map_err(|e| SimcacheError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                merge_tables(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
