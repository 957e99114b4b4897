//! Authorised repository gate

use super::Processor;
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use crate::urls::normalise_repo;
use async_trait::async_trait;

/// Step name
pub const NAME: &str = "checkRepoInAuthorisedList";

/// Blocks actions on repositories the store does not list
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckRepoInAuthorisedList;

#[async_trait]
impl Processor for CheckRepoInAuthorisedList {
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

        let target = normalise_repo(&action.repo);
        let found = ctx
            .store
            .get_repos()
            .await?
            .iter()
            .any(|repo| normalise_repo(&format!("{}/{}", repo.project, repo.name)) == target);

        if found {
            step.log(format!("repo {} is in the authorisedList", action.repo));
        } else {
            step.log(format!(
                "repo {} is not in the authorisedList, ending",
                action.repo
            ));
            step.block(format!(
                "Rejecting repo {} not in the authorisedList",
                action.repo
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
    use crate::action::ActionKind;
    use crate::store::{MemoryStore, PushStore, Repo};
    use http::{HeaderMap, Method};
    use pushgate_config::Config;
    use std::sync::Arc;

    async fn ctx() -> ProxyContext {
        let store = MemoryStore::new();
        store
            .add_repo(Repo {
                project: "finos".to_string(),
                name: "git-proxy".to_string(),
                url: "https://github.com/finos/git-proxy.git".to_string(),
                ..Repo::default()
            })
            .await
            .unwrap();
        ProxyContext::new(Config::default(), Arc::new(store)).unwrap()
    }

    fn req() -> GitRequest {
        GitRequest::new(Method::POST, "/", HeaderMap::new(), Vec::new())
    }

    #[tokio::test]
    async fn test_listed_repo_passes() {
        let action = Action::new(
            "1",
            ActionKind::Push,
            "POST",
            1,
            "https://github.com/FINOS/git-proxy.git",
        );
        let action = CheckRepoInAuthorisedList
            .exec(&ctx().await, &req(), &action)
            .await
            .unwrap();
        assert!(action.should_continue());
        assert_eq!(
            action.steps[0].logs,
            vec!["checkRepoInAuthorisedList - repo FINOS/git-proxy.git is in the authorisedList"]
        );
    }

    #[tokio::test]
    async fn test_unlisted_repo_blocks_whatever_the_action_holds() {
        let ctx = ctx().await;
        let mut action = Action::new(
            "1",
            ActionKind::Pull,
            "POST",
            1,
            "https://github.com/other/repo.git",
        );
        action.auto_approved = true;
        action.add_step(Step::new("earlier"));

        let first = CheckRepoInAuthorisedList
            .exec(&ctx, &req(), &action)
            .await
            .unwrap();
        assert!(first.blocked);
        assert!(!first.error);
        assert_eq!(
            first.blocked_message.as_deref(),
            Some("Rejecting repo other/repo.git not in the authorisedList")
        );

        // running it again keeps the block
        let second = CheckRepoInAuthorisedList
            .exec(&ctx, &req(), &first)
            .await
            .unwrap();
        assert!(second.blocked);
        assert_eq!(second.steps.len(), 3);
    }
}
