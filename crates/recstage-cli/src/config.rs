//! Configuration loading from TOML files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use recstage_core::{DataSourceConfig, DataSources};
use serde::Deserialize;

/// Global configuration for recstage
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub ingest: IngestConfig,
    /// `[sources.<id>]` tables
    pub sources: BTreeMap<String, DataSourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/records.duckdb"),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct IngestConfig {
    /// Set the "seen" mark on every stored record.
    pub mark_seen: bool,
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

/// Expand every string value of a parsed TOML tree in place.
fn expand_env_vars(value: &mut toml::Value) -> Result<()> {
    match value {
        toml::Value::String(s) => {
            *s = expand_env_var(s)
                .with_context(|| format!("environment variable in '{s}' is not set"))?;
        }
        toml::Value::Array(items) => {
            for item in items {
                expand_env_vars(item)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                expand_env_vars(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./recstage.toml (current directory)
    /// 2. ~/.config/recstage/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("recstage.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "recstage") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub(crate) fn parse(content: &str) -> Result<Self> {
        let mut value: toml::Value = toml::from_str(content)?;
        expand_env_vars(&mut value)?;
        Ok(value.try_into()?)
    }

    /// Validated source settings with host linkage resolved.
    pub fn data_sources(&self) -> Result<DataSources> {
        DataSources::resolve(&self.sources).context("invalid [sources] configuration")
    }
}
