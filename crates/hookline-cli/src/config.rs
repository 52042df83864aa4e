//! Configuration file handling for hookline

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Daemon URL used when neither flag nor file names one
pub const DEFAULT_SERVER: &str = "http://localhost:7340";

/// Domain used when a command does not name one
pub const DEFAULT_DOMAIN: &str = "canbus";

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default daemon URL
    pub server: Option<String>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Default provider address
    pub provider: Option<String>,
    /// Default device domain
    pub domain: Option<String>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// `<config_dir>/hookline/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("hookline");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        server: Option<&str>,
        provider: Option<&str>,
        domain: Option<&str>,
        no_color: bool,
    ) -> MergedConfig {
        MergedConfig {
            server: server
                .map(String::from)
                .or_else(|| self.server.clone())
                .unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            provider: provider.map(String::from).or_else(|| self.provider.clone()),
            domain: domain
                .map(String::from)
                .or_else(|| self.domain.clone())
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            no_color: no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub server: String,
    pub provider: Option<String>,
    pub domain: String,
    pub no_color: bool,
}

impl MergedConfig {
    /// Provider to address, from the flag or the config file
    pub fn provider(&self) -> Result<&str> {
        self.provider
            .as_deref()
            .context("No provider given; pass --provider or set `provider` in the config file")
    }
}
