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

//! Push and pull plugins
//!
//! A plugin is any [`Processor`]. Plugins are registered before the chain is
//! built and spliced in right after push parsing (push) or at the start of
//! the pull chain. Registration order is execution order.
//!
//! # Example
//!
//! ```rust,no_run
//! use pushgate_core::plugins::{BranchName, PluginRegistry};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut registry = PluginRegistry::new();
//! registry.register_push(Arc::new(BranchName::new("^(main|feature/.+)$")?));
//! assert_eq!(registry.push().len(), 1);
//! # Ok(())
//! # }
//! ```

mod branch_name;
mod crypto_usage;

pub use branch_name::BranchName;
pub use crypto_usage::{CryptoFinding, CryptoUsage, Severity};

use crate::processors::Processor;
use pushgate_config::{ConfigError, ConfigResult, PluginsConfig};
use std::sync::Arc;
use tracing::info;

/// Catalogue name of [`BranchName`]
pub const BRANCH_NAME: &str = "branch-name";

/// Catalogue name of [`CryptoUsage`]
pub const CRYPTO_USAGE: &str = "crypto-usage";

/// Ordered push and pull plugins
#[derive(Debug, Default, Clone)]
pub struct PluginRegistry {
    push: Vec<Arc<dyn Processor>>,
    pull: Vec<Arc<dyn Processor>>,
}

impl PluginRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `[plugins]` against the built-in catalogue
    pub fn from_config(config: &PluginsConfig) -> ConfigResult<Self> {
        let mut registry = Self::new();
        for name in &config.push {
            registry.register_push(catalogue_entry(name, config)?);
        }
        for name in &config.pull {
            registry.register_pull(catalogue_entry(name, config)?);
        }
        Ok(registry)
    }

    /// Append a push plugin
    pub fn register_push(&mut self, plugin: Arc<dyn Processor>) -> &mut Self {
        info!(plugin = plugin.name(), "Registered push plugin");
        self.push.push(plugin);
        self
    }

    /// Append a pull plugin
    pub fn register_pull(&mut self, plugin: Arc<dyn Processor>) -> &mut Self {
        info!(plugin = plugin.name(), "Registered pull plugin");
        self.pull.push(plugin);
        self
    }

    /// Push plugins in registration order
    pub fn push(&self) -> &[Arc<dyn Processor>] {
        &self.push
    }

    /// Pull plugins in registration order
    pub fn pull(&self) -> &[Arc<dyn Processor>] {
        &self.pull
    }
}

/// Instantiate a built-in plugin by name
pub fn catalogue_entry(name: &str, config: &PluginsConfig) -> ConfigResult<Arc<dyn Processor>> {
    match name {
        BRANCH_NAME => Ok(Arc::new(BranchName::new(&config.branch_name.pattern)?)),
        CRYPTO_USAGE => Ok(Arc::new(CryptoUsage::new())),
        other => Err(ConfigError::invalid_value(
            "plugins",
            format!("unknown plugin '{other}'"),
        )),
    }
}
