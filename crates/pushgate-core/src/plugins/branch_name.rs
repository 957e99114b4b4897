//! Branch naming convention

use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::processors::Processor;
use crate::request::GitRequest;
use async_trait::async_trait;
use pushgate_config::{ConfigError, ConfigResult};
use regex_lite::Regex;

/// Step name
pub const NAME: &str = "checkBranchName";

/// Blocks branch pushes whose name does not match a pattern.
///
/// The name is matched without its `refs/heads/` prefix. Tag pushes pass.
#[derive(Debug, Clone)]
pub struct BranchName {
    pattern: Regex,
}

impl BranchName {
    /// Compile the branch pattern
    pub fn new(pattern: &str) -> ConfigResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            ConfigError::invalid_pattern("plugins.branch_name.pattern", pattern, e.to_string())
        })?;
        Ok(BranchName { pattern })
    }
}

#[async_trait]
impl Processor for BranchName {
    fn name(&self) -> &str {
        NAME
    }

    async fn exec(
        &self,
        _ctx: &ProxyContext,
        _req: &GitRequest,
        action: &Action,
    ) -> ProcessResult<Action> {
        let mut action = action.clone();
        let mut step = Step::new(NAME);

        if action.branch.is_some() {
            let name = action.short_ref().unwrap_or_default().to_string();
            if self.pattern.is_match(&name) {
                step.log(format!("Branch {name} follows the naming convention"));
            } else {
                step.block(format!(
                    "Your push has been blocked.\nBranch name '{name}' does not match the required pattern {}",
                    self.pattern.as_str()
                ));
            }
        }

        action.add_step(step);
        Ok(action)
    }
}
