//! Secret scan with the gitleaks CLI

use super::{clone_dir, Processor};
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::git::{run_process, RunOptions};
use crate::request::GitRequest;
use async_trait::async_trait;
use pushgate_config::GitleaksConfig;
use std::time::Duration;
use tracing::{error, info};

/// Step name
pub const NAME: &str = "gitleaks";

/// Exit status gitleaks is told to use when it finds leaks
const FINDINGS_EXIT_CODE: i32 = 99;

/// Runs gitleaks over the pushed range when `[gitleaks] enabled`
#[derive(Debug, Default, Clone, Copy)]
pub struct Gitleaks;

fn gitleaks_args(config: &GitleaksConfig, log_range: &str) -> Vec<String> {
    let mut args = vec![
        format!("--exit-code={FINDINGS_EXIT_CODE}"),
        "--platform=none".to_string(),
    ];
    if let Some(path) = &config.config_path {
        args.push(format!("--config={}", path.display()));
    }
    if config.ignore_gitleaks_allow {
        args.push("--ignore-gitleaks-allow".to_string());
    }
    args.push("--no-banner".to_string());
    if config.no_color {
        args.push("--no-color".to_string());
    }
    args.push("--redact".to_string());
    args.push("--verbose".to_string());
    args.push("git".to_string());
    args.push(format!("--log-opts=--first-parent {log_range}"));
    args
}

#[async_trait]
impl Processor for Gitleaks {
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
        let config = &ctx.config.gitleaks;

        if !config.enabled {
            step.log("gitleaks is disabled, skipping");
            action.add_step(step);
            return Ok(action);
        }

        let (Some(repo), Some(from), Some(to)) = (
            clone_dir(&action),
            action.commit_from.clone(),
            action.commit_to.clone(),
        ) else {
            step.set_error("failed setup gitleaks, please contact an administrator\n");
            action.add_step(step);
            return Ok(action);
        };

        let root = match ctx
            .git
            .check(Some(&repo), &["rev-list", "--max-parents=0", "HEAD"])
            .await
        {
            Ok(out) => out.trim().to_string(),
            Err(e) => {
                error!(action_id = %action.id, error = %e, "Failed to find the root commit");
                step.set_error("failed to spawn gitleaks, please contact an administrator\n");
                action.add_step(step);
                return Ok(action);
            }
        };
        let start = if root == from { root } else { format!("{from}^") };
        let args = gitleaks_args(config, &format!("{start}..{to}"));

        info!(action_id = %action.id, range = %format!("{from}:{to}"), "Scanning range with gitleaks");
        let options = RunOptions {
            cwd: Some(repo),
            timeout: Some(Duration::from_secs(config.timeout_secs)),
            ..RunOptions::default()
        };
        match run_process(&config.binary, &args, options).await {
            Ok(output) if output.success() => {
                step.log("gitleaks found no leaks");
            }
            Ok(output) if output.status == Some(FINDINGS_EXIT_CODE) => {
                step.block(format!("\n{}{}", output.stdout, output.stderr));
            }
            Ok(output) => {
                error!(status = ?output.status, stderr = %output.stderr.trim(), "gitleaks failed");
                step.set_error("failed to run gitleaks, please contact an administrator\n");
            }
            Err(e) => {
                error!(error = %e, "Failed to spawn gitleaks");
                step.set_error("failed to spawn gitleaks, please contact an administrator\n");
            }
        }

        action.add_step(step);
        Ok(action)
    }
}
