//! Workspace cleanup

use super::Processor;
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use async_trait::async_trait;

/// Step name
pub const NAME: &str = "clearBareClone";

/// Removes the workspace created by pullRemote.
///
/// This is the only processor that deletes a workspace. The chain also runs
/// it during finalisation when it stops after pullRemote.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClearBareClone;

#[async_trait]
impl Processor for ClearBareClone {
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

        match action.proxy_git_path.clone() {
            None => step.set_error("proxyGitPath is not set, there is no clone to remove"),
            Some(path) => match ctx.workspace.remove(&path).await {
                Ok(true) => step.log(format!("{} is deleted!", path.display())),
                Ok(false) => step.log(format!("{} was already removed", path.display())),
                Err(e) => step.set_error(e.to_string()),
            },
        }

        action.add_step(step);
        Ok(action)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::store::MemoryStore;
    use http::{HeaderMap, Method};
    use pushgate_config::Config;
    use std::sync::Arc;

    async fn run(ctx: &ProxyContext, action: &Action) -> Action {
        let req = GitRequest::new(Method::POST, "/", HeaderMap::new(), Vec::new());
        ClearBareClone.exec(ctx, &req, action).await.unwrap()
    }

    #[tokio::test]
    async fn test_removes_workspace() {
        let root = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.workspace.dir = root.path().to_path_buf();
        let ctx = ProxyContext::new(config, Arc::new(MemoryStore::new())).unwrap();

        let dir = ctx.workspace.prepare("a__b").await.unwrap();
        std::fs::create_dir(dir.join("r.git")).unwrap();
        let mut action = Action::new("a__b", ActionKind::Push, "POST", 1, "https://h/o/r.git");
        action.proxy_git_path = Some(dir.clone());

        let action = run(&ctx, &action).await;
        assert!(action.should_continue());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_unset_path_is_an_error() {
        let ctx = ProxyContext::new(Config::default(), Arc::new(MemoryStore::new())).unwrap();
        let action = Action::new("1", ActionKind::Push, "POST", 1, "https://h/o/r.git");
        let action = run(&ctx, &action).await;
        assert!(action.error);
    }
}
