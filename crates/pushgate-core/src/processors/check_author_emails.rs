//! Author email rules

use super::Processor;
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Step name
pub const NAME: &str = "checkAuthorEmails";

const BLOCK_MESSAGE: &str = "Your push has been blocked. Please verify your Git configured e-mail address is valid (e.g. john.smith@example.com)";

/// Blocks pushes whose commit authors use malformed or disallowed addresses
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckAuthorEmails;

#[async_trait]
impl Processor for CheckAuthorEmails {
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
            .map(|commit| commit.author_email.as_str())
            .collect();
        let illegal: Vec<&str> = unique
            .iter()
            .copied()
            .filter(|email| !ctx.rules.email_allowed(email))
            .collect();

        if illegal.is_empty() {
            let legal: Vec<&str> = unique.into_iter().collect();
            step.log(format!(
                "The following commit author e-mails are legal: {}",
                legal.join(", ")
            ));
        } else {
            step.log(format!(
                "The following commit author e-mails are illegal: {}",
                illegal.join(", ")
            ));
            step.block(BLOCK_MESSAGE);
        }

        action.add_step(step);
        Ok(action)
    }
}
