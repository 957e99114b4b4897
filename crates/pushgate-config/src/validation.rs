use crate::error::{ConfigError, ConfigResult};
use crate::schema::*;

/// Validator for configuration settings
pub trait Validator {
    fn validate(&self) -> ConfigResult<()>;
}

impl Validator for Config {
    fn validate(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.proxy.validate()?;
        for (index, repo) in self.authorised_list.iter().enumerate() {
            repo.validate()
                .map_err(|e| ConfigError::validation_error(format!("authorised_list[{index}]: {e}")))?;
        }
        self.commit.validate()?;
        self.hooks.validate()?;
        self.git.validate()?;
        self.workspace.validate()?;
        self.gitleaks.validate()?;
        self.store.validate()?;
        self.plugins.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}

impl Validator for ServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.host.is_empty() {
            return Err(ConfigError::MissingRequired("server.host".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::invalid_value(
                "server.port",
                format!("port must be between 1 and 65535, got {}", self.port),
            ));
        }

        if self.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than 0",
            ));
        }

        if matches!(&self.api_key, Some(key) if key.trim().is_empty()) {
            return Err(ConfigError::invalid_value(
                "server.api_key",
                "must not be blank when set",
            ));
        }

        Ok(())
    }
}

impl Validator for ProxyConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_http_url("proxy.proxy_url", &self.proxy_url)?;
        validate_http_url("proxy.ui_url", &self.ui_url)?;
        Ok(())
    }
}

impl Validator for RepoEntry {
    fn validate(&self) -> ConfigResult<()> {
        if self.project.is_empty() {
            return Err(ConfigError::MissingRequired("project".to_string()));
        }
        if self.name.is_empty() {
            return Err(ConfigError::MissingRequired("name".to_string()));
        }
        validate_http_url("url", &self.url)
    }
}

impl Validator for CommitConfig {
    fn validate(&self) -> ConfigResult<()> {
        let email = &self.author.email;
        if !email.local_block.is_empty() {
            compile_pattern("commit.author.email.local_block", &email.local_block)?;
        }
        compile_pattern("commit.author.email.domain_allow", &email.domain_allow)?;

        for pattern in &self.message.block_patterns {
            compile_pattern("commit.message.block_patterns", pattern)?;
        }
        for pattern in &self.diff.block_patterns {
            compile_pattern("commit.diff.block_patterns", pattern)?;
        }
        for (name, pattern) in &self.diff.providers {
            compile_pattern(&format!("commit.diff.providers.{name}"), pattern)?;
        }

        if self.message.block_literals.iter().any(String::is_empty)
            || self.diff.block_literals.iter().any(String::is_empty)
        {
            return Err(ConfigError::invalid_value(
                "commit.block_literals",
                "literals must not be empty strings",
            ));
        }

        Ok(())
    }
}

impl Validator for HooksConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.pre_receive.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("hooks.pre_receive".to_string()));
        }
        validate_timeout("hooks.timeout_secs", self.timeout_secs)
    }
}

impl Validator for GitConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.binary.is_empty() {
            return Err(ConfigError::MissingRequired("git.binary".to_string()));
        }
        if let Some(key) = self.config.keys().find(|key| key.is_empty() || key.contains('=')) {
            return Err(ConfigError::invalid_value(
                "git.config",
                format!("invalid key {key:?}"),
            ));
        }
        validate_timeout("git.timeout_secs", self.timeout_secs)
    }
}

impl Validator for WorkspaceConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("workspace.dir".to_string()));
        }
        Ok(())
    }
}

impl Validator for GitleaksConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }

        if let Some(path) = &self.config_path {
            if !path.is_file() {
                return Err(ConfigError::invalid_value(
                    "gitleaks.config_path",
                    format!("{} is not a readable file", path.display()),
                ));
            }
        }

        validate_timeout("gitleaks.timeout_secs", self.timeout_secs)
    }
}

impl Validator for StoreConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self {
            StoreConfig::Memory => Ok(()),
            StoreConfig::File(file) => {
                if file.path.as_os_str().is_empty() {
                    return Err(ConfigError::MissingRequired("store.path".to_string()));
                }
                Ok(())
            }
        }
    }
}

impl Validator for PluginsConfig {
    fn validate(&self) -> ConfigResult<()> {
        compile_pattern("plugins.branch_name.pattern", &self.branch_name.pattern)?;
        Ok(())
    }
}

impl Validator for ObservabilityConfig {
    fn validate(&self) -> ConfigResult<()> {
        let valid_levels = ["debug", "info", "warn", "error", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::invalid_value(
                "observability.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(ConfigError::invalid_value(
                "observability.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        Ok(())
    }
}

fn validate_http_url(field: &str, url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::MissingRequired(field.to_string()));
    }
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ConfigError::invalid_value(field, "URL must start with http:// or https://"))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ConfigError::invalid_value(field, "URL has no host"));
    }
    Ok(())
}

fn validate_timeout(field: &str, secs: u64) -> ConfigResult<()> {
    if secs == 0 {
        return Err(ConfigError::invalid_value(field, "must be greater than 0"));
    }
    Ok(())
}

fn compile_pattern(field: &str, pattern: &str) -> ConfigResult<()> {
    regex_lite::Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::invalid_pattern(field, pattern, e.to_string()))
}
