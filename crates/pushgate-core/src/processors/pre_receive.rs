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

//! External pre-receive hook
//!
//! The hook is an executable configured at `[hooks] pre_receive`. It reads
//! `"{from} {to} {branch} \n"` on stdin, gets the same values as arguments
//! and as `PUSHGATE_*` variables, and decides through its exit status:
//!
//! | Status | Outcome |
//! |--------|---------|
//! | 0 | auto-approved |
//! | 1 | auto-rejected, push blocked |
//! | 2 | manual review |
//! | other, signal, timeout | step error |

use super::{clone_dir, Processor};
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::git::{run_process, RunOptions};
use crate::request::GitRequest;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::info;

/// Step name
pub const NAME: &str = "executeExternalPreReceiveHook";

const AUTO_REJECTED: &str = "Push automatically rejected by pre-receive hook.";
const UNKNOWN_ERROR: &str = "Unknown pre-receive hook error.";

/// Runs the configured hook and maps its exit status to a decision
#[derive(Debug, Default, Clone, Copy)]
pub struct PreReceive;

async fn hook_exists(path: &Path) -> bool {
    let in_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::try_exists(dir).await.unwrap_or(false),
        _ => true,
    };
    in_dir && fs::try_exists(path).await.unwrap_or(false)
}

#[async_trait]
impl Processor for PreReceive {
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

        let hook = std::path::absolute(&ctx.config.hooks.pre_receive)
            .unwrap_or_else(|_| ctx.config.hooks.pre_receive.clone());
        if !hook_exists(&hook).await {
            step.log("Pre-receive hook not found, skipping execution.");
            action.add_step(step);
            return Ok(action);
        }

        let from = action.commit_from.clone().unwrap_or_default();
        let to = action.commit_to.clone().unwrap_or_default();
        let branch = action
            .branch
            .clone()
            .or_else(|| action.tag.clone())
            .unwrap_or_default();
        let repo = clone_dir(&action);

        step.log(format!("Executing pre-receive hook from: {}", hook.display()));

        let mut env = vec![
            ("PUSHGATE_COMMIT_FROM".to_string(), from.clone()),
            ("PUSHGATE_COMMIT_TO".to_string(), to.clone()),
            ("PUSHGATE_BRANCH".to_string(), branch.clone()),
        ];
        if let Some(repo) = &repo {
            env.push((
                "PUSHGATE_REPO_PATH".to_string(),
                repo.to_string_lossy().into_owned(),
            ));
        }
        let options = RunOptions {
            cwd: repo,
            env,
            stdin: Some(Bytes::from(format!("{from} {to} {branch} \n"))),
            timeout: Some(Duration::from_secs(ctx.config.hooks.timeout_secs)),
        };

        let program = hook.to_string_lossy();
        let output = match run_process(&program, [&from, &to, &branch], options).await {
            Ok(output) => output,
            Err(e) => {
                step.log("Push failed, pre-receive hook returned an error.");
                step.set_error(format!("Hook execution error: {e}"));
                action.add_step(step);
                return Ok(action);
            }
        };

        let stdout = output.stdout.trim();
        if !stdout.is_empty() {
            step.log(stdout);
        }
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            step.log(stderr);
        }

        match output.status {
            Some(0) => {
                step.log("Hook exited with status 0");
                step.log("Push automatically approved by pre-receive hook.");
                action.auto_approved = true;
            }
            Some(1) => {
                step.log("Hook exited with status 1");
                step.log(AUTO_REJECTED);
                step.block(AUTO_REJECTED);
                action.auto_rejected = true;
            }
            Some(2) => {
                step.log("Hook exited with status 2");
                step.log("Push requires manual approval.");
            }
            status => {
                let status = status.map_or_else(|| "signal".to_string(), |s| s.to_string());
                step.log(format!("Unexpected hook status: {status}"));
                step.set_error(if stdout.is_empty() {
                    UNKNOWN_ERROR.to_string()
                } else {
                    stdout.to_string()
                });
            }
        }
        info!(
            action_id = %action.id,
            status = ?output.status,
            "Pre-receive hook finished"
        );

        action.add_step(step);
        Ok(action)
    }
}
