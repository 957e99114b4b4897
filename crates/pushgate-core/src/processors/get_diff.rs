//! Unified diff of the pushed range

use super::{clone_dir, Processor, EMPTY_TREE};
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use async_trait::async_trait;
use pushgate_protocol::{is_zero_id, UpdateKind};

/// Step name; scanDiff looks the diff up by it
pub const NAME: &str = "diff";

const NO_COMMIT_DATA: &str = "Your push has been blocked because no commit data was found.";

/// Stores `git diff {from} {to}` as the step content
#[derive(Debug, Default, Clone, Copy)]
pub struct GetDiff;

#[async_trait]
impl Processor for GetDiff {
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
        if deletion {
            step.log("Ref deletion, nothing to diff");
            action.add_step(step);
            return Ok(action);
        }

        if action.commit_data.is_empty() {
            step.set_error(NO_COMMIT_DATA);
            action.add_step(step);
            return Ok(action);
        }

        let (Some(repo), Some(from), Some(to)) = (
            clone_dir(&action),
            action.commit_from.clone(),
            action.commit_to.clone(),
        ) else {
            step.set_error("No bare clone or commit range to diff");
            action.add_step(step);
            return Ok(action);
        };

        let from = if is_zero_id(&from) {
            EMPTY_TREE.to_string()
        } else {
            from
        };
        step.log(format!("Diffing {from}..{to}"));

        match ctx.git.run(Some(&repo), &["diff", &from, &to]).await {
            Ok(output) if output.success() && !output.stderr.contains("fatal") => {
                step.set_content(output.stdout);
            }
            Ok(output) => step.set_error(output.stderr.trim().to_string()),
            Err(e) => step.set_error(e.to_string()),
        }

        action.add_step(step);
        Ok(action)
    }
}
