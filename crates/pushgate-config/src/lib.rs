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

//! Configuration management for pushgate
//!
//! # Features
//!
//! - Multi-format configuration support (TOML, YAML, JSON)
//! - Environment variable overrides with `PUSHGATE_` prefix
//! - Validation of ports, URLs, timeouts and every configured regex
//! - Seed data for the authorised repository list and users
//!
//! # Example
//!
//! ```no_run
//! use pushgate_config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loader = ConfigLoader::new();
//!     let config = loader.load_with_overrides(Some("pushgate.toml")).await?;
//!
//!     println!("Listening on: {}:{}", config.server.host, config.server.port);
//!     println!("Authorised repositories: {}", config.authorised_list.len());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

// Re-export commonly used items
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader, ENV_PREFIX};
pub use schema::*;
pub use validation::Validator;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.proxy.proxy_url, "https://github.com");
        assert_eq!(config.commit.author.email.domain_allow, ".*");
        assert_eq!(config.workspace.dir, std::path::PathBuf::from("./.remote"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("pre-receive.sh"));
        assert!(!json.contains("api_key"));
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }
}
