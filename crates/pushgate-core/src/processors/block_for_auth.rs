//! Manual review gate

use super::Processor;
use crate::action::{Action, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use async_trait::async_trait;

/// Step name
pub const NAME: &str = "authBlock";

/// Holds the push for review unless the pre-receive hook approved it
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockForAuth;

/// Dashboard link for a push
pub fn review_url(ui_url: &str, id: &str) -> String {
    format!("{}/dashboard/push/{id}", ui_url.trim_end_matches('/'))
}

#[async_trait]
impl Processor for BlockForAuth {
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

        if action.auto_approved {
            step.log("Push was approved by the pre-receive hook");
            action.add_step(step);
            action.set_allow_push();
            return Ok(action);
        }

        let url = review_url(&ctx.config.proxy.ui_url, &action.id);
        step.log(format!("Push awaiting review at {url}"));
        step.block(format!(
            "\n\n\n\x1B[32mPushgate has received your push\x1B[0m\n\nShareable link\n\n\x1B[34m{url}\x1B[0m\n\n\n"
        ));

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

    async fn run(auto_approved: bool) -> Action {
        let mut config = Config::default();
        config.proxy.ui_url = "https://review.example.com/".to_string();
        let ctx = ProxyContext::new(config, Arc::new(MemoryStore::new())).unwrap();
        let mut action = Action::new("a__b", ActionKind::Push, "POST", 1, "https://h/o/r.git");
        action.auto_approved = auto_approved;
        let req = GitRequest::new(Method::POST, "/", HeaderMap::new(), Vec::new());
        BlockForAuth.exec(&ctx, &req, &action).await.unwrap()
    }

    #[tokio::test]
    async fn test_blocks_with_link() {
        let action = run(false).await;
        assert!(action.is_pending_review());
        assert!(action
            .blocked_message
            .unwrap()
            .contains("https://review.example.com/dashboard/push/a__b"));
    }

    #[tokio::test]
    async fn test_auto_approved_is_allowed() {
        let action = run(true).await;
        assert!(action.allow_push);
        assert!(!action.blocked);
    }
}
