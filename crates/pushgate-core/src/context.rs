//! Shared, read-only dependencies of every chain execution

use crate::git::Git;
use crate::policy::PolicyRules;
use crate::store::PushStore;
use crate::workspace::WorkspaceManager;
use pushgate_config::{Config, ConfigResult};
use std::sync::Arc;

/// What processors may read besides the request and the action.
///
/// Built once at startup. Cloning is cheap and every clone shares the same
/// store.
#[derive(Debug, Clone)]
pub struct ProxyContext {
    /// Loaded configuration
    pub config: Arc<Config>,
    /// Persistence gateway
    pub store: Arc<dyn PushStore>,
    /// git CLI
    pub git: Git,
    /// Temporary clone directories
    pub workspace: WorkspaceManager,
    /// Compiled `[commit]` rules
    pub rules: Arc<PolicyRules>,
}

impl ProxyContext {
    /// Derive the context from configuration
    pub fn new(config: Config, store: Arc<dyn PushStore>) -> ConfigResult<Self> {
        let rules = PolicyRules::compile(&config.commit, &config.private_organizations)?;
        Ok(ProxyContext {
            git: Git::from_config(&config.git),
            workspace: WorkspaceManager::new(&config.workspace.dir),
            rules: Arc::new(rules),
            config: Arc::new(config),
            store,
        })
    }
}
