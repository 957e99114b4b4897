//! Pushes that carry no commits

use super::{clone_dir, Processor};
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use async_trait::async_trait;
use pushgate_protocol::{is_zero_id, UpdateKind};
use tracing::debug;

/// Step name
pub const NAME: &str = "checkEmptyBranch";

const EMPTY_BRANCH: &str =
    "Push blocked: Empty branch. Please make a commit before pushing a new branch.";
const NO_COMMIT_DATA: &str =
    "Push blocked: Commit data not found. Please contact an administrator for support.";

/// Blocks a new branch pointing at an existing commit, and any other push
/// without commit data that is not a deletion
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckEmptyBranch;

impl CheckEmptyBranch {
    async fn is_empty_branch(ctx: &ProxyContext, action: &Action) -> bool {
        if !action.commit_from.as_deref().is_some_and(is_zero_id) {
            return false;
        }
        let (Some(repo), Some(to)) = (clone_dir(action), action.commit_to.as_deref()) else {
            return false;
        };
        match ctx.git.check(Some(&repo), &["cat-file", "-t", to]).await {
            Ok(kind) => kind.trim() == "commit",
            Err(e) => {
                debug!(commit = to, error = %e, "Commit not found");
                false
            }
        }
    }
}

#[async_trait]
impl Processor for CheckEmptyBranch {
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

        let deletion = action
            .ref_updates
            .first()
            .is_some_and(|update| update.kind() == UpdateKind::Delete);

        if !action.commit_data.is_empty() {
            step.log(format!("{} commit(s) pushed", action.commit_data.len()));
        } else if deletion {
            step.log("Ref deletion, no commits expected");
        } else if Self::is_empty_branch(ctx, &action).await {
            step.block(EMPTY_BRANCH);
        } else {
            step.block(NO_COMMIT_DATA);
        }

        action.add_step(step);
        Ok(action)
    }
}
