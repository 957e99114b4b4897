//! Re-pushes of already reviewed actions

use super::Processor;
use crate::action::{Action, Decision, Step};
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use async_trait::async_trait;

/// Step name
pub const NAME: &str = "checkIfWaitingAuth";

/// Lets a push through when the store already holds an authorised record
/// for the same commit range
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckIfWaitingAuth;

#[async_trait]
impl Processor for CheckIfWaitingAuth {
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

        let existing = ctx.store.get_push(&action.id).await?;
        match existing.as_ref().and_then(Action::decision) {
            Some(Decision::Authorised) if !action.error => {
                step.log(format!("Push {} was already authorised", action.id));
                action.attestation = existing.and_then(|push| push.attestation);
                action.authorised = true;
                action.set_allow_push();
            }
            Some(decision) => {
                step.log(format!(
                    "Push {} was previously {decision:?}, reviewing again",
                    action.id
                ));
            }
            None => {}
        }

        action.add_step(step);
        Ok(action)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, Attestation};
    use crate::store::{MemoryStore, PushStore};
    use http::{HeaderMap, Method};
    use pushgate_config::Config;
    use std::sync::Arc;

    fn action() -> Action {
        let mut action = Action::new("1", ActionKind::Push, "POST", 1, "https://h/o/r.git");
        action.set_commit("a", "b");
        action
    }

    async fn run(store: MemoryStore, action: &Action) -> Action {
        let ctx = ProxyContext::new(Config::default(), Arc::new(store)).unwrap();
        let req = GitRequest::new(Method::POST, "/", HeaderMap::new(), Vec::new());
        CheckIfWaitingAuth.exec(&ctx, &req, action).await.unwrap()
    }

    #[tokio::test]
    async fn test_authorised_record_allows_push() {
        let store = MemoryStore::new();
        let mut stored = action();
        stored.record_decision(Decision::Authorised, Some(Attestation::by("carol", "carol-gh")));
        store.write_audit(&stored).await.unwrap();

        let result = run(store, &action()).await;
        assert!(result.allow_push);
        assert!(!result.steps[0].error());
        assert_eq!(
            result.attestation.unwrap().reviewer.username,
            "carol".to_string()
        );
    }

    #[tokio::test]
    async fn test_pending_record_does_nothing() {
        let store = MemoryStore::new();
        store.write_audit(&action()).await.unwrap();

        let result = run(store, &action()).await;
        assert!(!result.allow_push);
        assert_eq!(result.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_push_does_nothing() {
        let result = run(MemoryStore::new(), &action()).await;
        assert!(!result.allow_push);
    }

    #[tokio::test]
    async fn test_errored_action_is_left_alone() {
        let store = MemoryStore::new();
        let mut stored = action();
        stored.record_decision(Decision::Authorised, None);
        store.write_audit(&stored).await.unwrap();

        let mut errored = action();
        errored.error = true;
        let result = run(store, &errored).await;
        assert!(!result.allow_push);
        assert!(result.error);
    }
}
