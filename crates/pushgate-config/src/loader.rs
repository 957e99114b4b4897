// Copyright (C) 2026  winnyboy5
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{Config, FileStoreConfig, StoreConfig};
use crate::validation::Validator;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "PUSHGATE_";

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::InvalidPath(path.to_path_buf())),
        }
    }

    /// Get format name as string
    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Json => "JSON",
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    validate: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        ConfigLoader { validate: true }
    }

    /// Create a loader without validation
    pub fn without_validation() -> Self {
        ConfigLoader { validate: false }
    }

    /// Load configuration from a file
    pub async fn load_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<Config> {
        let path = path.as_ref();
        debug!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).await?;
        let format = ConfigFormat::from_path(path)?;

        info!(
            "Loaded {} configuration file: {}",
            format.name(),
            path.display()
        );

        self.load_from_string(&content, format)
    }

    /// Load configuration from a string
    pub fn load_from_string(&self, content: &str, format: ConfigFormat) -> ConfigResult<Config> {
        let config: Config = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => parse_yaml(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };

        debug!("Configuration loaded from {}", format.name());

        if self.validate {
            config.validate()?;
            info!("Configuration validated successfully");
        }

        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Without a path the defaults are used as the base. Validation runs
    /// after the overrides so an override cannot slip past it.
    pub async fn load_with_overrides<P: AsRef<Path>>(
        &self,
        path: Option<P>,
    ) -> ConfigResult<Config> {
        let mut config = match path {
            Some(path) => ConfigLoader::without_validation().load_file(path).await?,
            None => {
                info!("No configuration file given, using defaults");
                Config::default()
            }
        };

        self.apply_env_overrides(&mut config)?;

        if self.validate {
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply `PUSHGATE_*` environment variable overrides
    pub fn apply_env_overrides(&self, config: &mut Config) -> ConfigResult<()> {
        self.apply_overrides_from(config, |name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup, keyed by full variable name
    pub fn apply_overrides_from<F>(&self, config: &mut Config, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name).map(|value| (name, value))
        };

        // Server settings
        if let Some((_, value)) = var("HOST") {
            config.server.host = value;
        }
        if let Some((name, value)) = var("PORT") {
            config.server.port = value.parse().map_err(|_| {
                ConfigError::env_var_parsing_error(
                    &name,
                    &value,
                    "expected valid port number (1-65535)",
                )
            })?;
        }
        if let Some((_, value)) = var("API_KEY") {
            config.server.api_key = Some(value);
        }

        // Proxy settings
        if let Some((_, value)) = var("PROXY_URL") {
            config.proxy.proxy_url = value;
        }
        if let Some((_, value)) = var("UI_URL") {
            config.proxy.ui_url = value;
        }

        // Observability settings
        if let Some((_, value)) = var("LOG_LEVEL") {
            config.observability.log_level = value;
        }
        if let Some((_, value)) = var("LOG_FORMAT") {
            config.observability.log_format = value;
        }

        // Processing settings
        if let Some((_, value)) = var("WORKSPACE_DIR") {
            config.workspace.dir = PathBuf::from(value);
        }
        if let Some((_, value)) = var("PRE_RECEIVE_HOOK") {
            config.hooks.pre_receive = PathBuf::from(value);
        }
        if let Some((name, value)) = var("GITLEAKS_ENABLED") {
            config.gitleaks.enabled = parse_bool(&name, &value)?;
        }

        // Store settings
        if let Some((_, value)) = var("STORE_PATH") {
            config.store = StoreConfig::File(FileStoreConfig {
                path: PathBuf::from(value),
            });
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// serde_yaml rejects an empty document, every other format accepts one
fn parse_yaml(content: &str) -> ConfigResult<Config> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Parse boolean from string (accepts: true, false, yes, no, 1, 0, on, off)
fn parse_bool(name: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::env_var_parsing_error(
            name,
            value,
            "expected 'true', 'false', 'yes', 'no', '1', '0', 'on', or 'off'",
        )),
    }
}
