//! Commit message rules

use super::Processor;
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Step name
pub const NAME: &str = "checkCommitMessages";

const BLOCK_MESSAGE: &str = "\n\n\n\nYour push has been blocked.\nPlease ensure your commit message(s) does not contain sensitive information or URLs.\n\n\n";

/// Blocks pushes containing an empty commit message or one matching `[commit.message]`
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckCommitMessages;

#[async_trait]
impl Processor for CheckCommitMessages {
    fn name(&self) -> &str {
        NAME
    }

    async fn exec(
        &self,
        ctx: &ProxyContext,
        _req: &GitRequest,
        action: &Action,
    ) -> ProcessResult<Action> {
        let mut action = action.clone();
        let mut step = Step::new(NAME);

        let unique: BTreeSet<&str> = action
            .commit_data
            .iter()
            .map(|commit| commit.message.as_str())
            .collect();
        let illegal: Vec<&str> = unique
            .iter()
            .copied()
            .filter(|message| !ctx.rules.message_allowed(message))
            .collect();

        if illegal.is_empty() {
            step.log(format!("{} commit message(s) are legal", unique.len()));
        } else {
            step.log(format!(
                "The following commit messages are illegal: {}",
                illegal.join(", ")
            ));
            step.block(BLOCK_MESSAGE);
        }

        action.add_step(step);
        Ok(action)
    }
}
