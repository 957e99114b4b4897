//! Commits smuggled into the pack outside the pushed range

use super::{clone_dir, Processor};
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use async_trait::async_trait;
use pushgate_protocol::is_zero_id;
use std::collections::BTreeSet;

/// Step name
pub const NAME: &str = "checkHiddenCommits";

/// Blocks when the written pack holds commits the ref range does not introduce
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckHiddenCommits;

/// Commit ids from `git verify-pack -v` output
fn pack_commits(verify_output: &str) -> impl Iterator<Item = &str> {
    verify_output.lines().filter_map(|line| {
        let mut fields = line.split_whitespace();
        let sha = fields.next()?;
        (fields.next()? == "commit").then_some(sha)
    })
}

#[async_trait]
impl Processor for CheckHiddenCommits {
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

        let (Some(repo), Some(from), Some(to)) = (
            clone_dir(&action),
            action.commit_from.clone(),
            action.commit_to.clone(),
        ) else {
            step.set_error("Both commitFrom and commitTo must be defined");
            action.add_step(step);
            return Ok(action);
        };

        let range = if is_zero_id(&from) {
            to.clone()
        } else {
            format!("{from}..{to}")
        };
        let introduced: BTreeSet<String> =
            match ctx.git.check(Some(&repo), &["rev-list", &range]).await {
                Ok(out) => out.lines().map(str::to_string).collect(),
                Err(e) => {
                    step.set_error(e.to_string());
                    action.add_step(step);
                    return Ok(action);
                }
            };
        step.log(format!("Total introduced commits: {}", introduced.len()));

        let mut in_pack = BTreeSet::new();
        for idx in &action.new_idx_files {
            let idx_path = format!("objects/pack/{idx}");
            match ctx.git.check(Some(&repo), &["verify-pack", "-v", &idx_path]).await {
                Ok(out) => in_pack.extend(pack_commits(&out).map(str::to_string)),
                Err(e) => {
                    step.set_error(e.to_string());
                    action.add_step(step);
                    return Ok(action);
                }
            }
        }
        step.log(format!("Total commits in the pack: {}", in_pack.len()));

        let (referenced, unreferenced): (Vec<&String>, Vec<&String>) =
            in_pack.iter().partition(|sha| introduced.contains(*sha));

        if unreferenced.is_empty() {
            step.log("All pack commits are referenced in the introduced range.");
            step.set_content(format!(
                "All {} pack commits are within introduced commits.",
                in_pack.len()
            ));
        } else {
            step.log(format!("Referenced commits: {}", referenced.len()));
            step.log(format!("Unreferenced commits: {}", unreferenced.len()));
            let list: Vec<&str> = unreferenced.iter().map(|sha| sha.as_str()).collect();
            step.block(format!(
                "Unreferenced commits in pack ({}): {}.\n\
                 This usually happens when a branch was made from a commit that hasn't been approved and pushed to the remote.\n\
                 Please get approval on the commits, push them and try again.",
                unreferenced.len(),
                list.join(", ")
            ));
            step.set_content(format!(
                "Referenced: {}, Unreferenced: {}",
                referenced.len(),
                unreferenced.len()
            ));
        }

        action.add_step(step);
        Ok(action)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_commits_from_verify_output() {
        let out = "\
aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa commit 230 155 12
bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb tree   33 44 167
cccccccccccccccccccccccccccccccccccccccc blob   5 14 211
non delta: 3 objects
objects/pack/pack-x.pack: ok
";
        assert_eq!(
            pack_commits(out).collect::<Vec<_>>(),
            vec!["aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"]
        );
    }
}
