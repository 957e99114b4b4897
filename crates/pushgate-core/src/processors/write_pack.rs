//! Apply the pushed pack to the bare clone

use super::{clone_dir, Processor};
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use tokio::fs;

/// Step name
pub const NAME: &str = "writePack";

/// Runs `git receive-pack` on the clone with the request body as input
#[derive(Debug, Default, Clone, Copy)]
pub struct WritePack;

/// `.idx` file names in `objects/pack`
pub(crate) async fn idx_files(repo: &Path) -> io::Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    let mut entries = match fs::read_dir(repo.join("objects").join("pack")).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".idx") {
            names.insert(name);
        }
    }
    Ok(names)
}

#[async_trait]
impl Processor for WritePack {
    fn name(&self) -> &str {
        NAME
    }

    async fn exec(
        &self,
        ctx: &ProxyContext,
        req: &GitRequest,
        action: &Action,
    ) -> ProcessResult<Action> {
        let mut action = action.clone();
        let mut step = Step::new(NAME);

        let (Some(workspace), Some(repo)) = (action.proxy_git_path.clone(), clone_dir(&action))
        else {
            step.set_error("No bare clone to write the pack into");
            action.add_step(step);
            return Ok(action);
        };

        if let Err(e) = ctx
            .git
            .check(Some(&repo), &["config", "receive.unpackLimit", "0"])
            .await
        {
            step.set_error(e.to_string());
            action.add_step(step);
            return Ok(action);
        }

        let before = match idx_files(&repo).await {
            Ok(before) => before,
            Err(e) => {
                step.set_error(format!("Failed to list pack files: {e}"));
                action.add_step(step);
                return Ok(action);
            }
        };

        let output = match ctx
            .git
            .run_with_input(
                Some(&workspace),
                &["receive-pack", &action.repo_name],
                req.body.clone(),
            )
            .await
        {
            Ok(output) => output,
            Err(e) => {
                step.set_error(e.to_string());
                action.add_step(step);
                return Ok(action);
            }
        };

        if !output.stdout.is_empty() {
            step.log(output.stdout.trim_end());
        }
        if !output.stderr.is_empty() {
            step.log(output.stderr.trim_end());
        }
        if !output.success() {
            step.set_error(format!(
                "git receive-pack failed: {}",
                output.stderr.trim()
            ));
            action.add_step(step);
            return Ok(action);
        }

        let after = idx_files(&repo).await.unwrap_or_default();
        action.new_idx_files = after.difference(&before).cloned().collect();
        step.log(format!("new idx files: {}", action.new_idx_files.join(", ")));
        step.set_content(output.stdout);

        action.add_step(step);
        Ok(action)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_idx_files_lists_only_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let pack = dir.path().join("objects").join("pack");
        std::fs::create_dir_all(&pack).unwrap();
        std::fs::write(pack.join("pack-a.idx"), b"").unwrap();
        std::fs::write(pack.join("pack-a.pack"), b"").unwrap();

        let names = idx_files(dir.path()).await.unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["pack-a.idx"]);
    }

    #[tokio::test]
    async fn test_missing_pack_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(idx_files(dir.path()).await.unwrap().is_empty());
    }
}
