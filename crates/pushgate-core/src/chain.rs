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

//! Chain orchestration
//!
//! A [`Chain`] is built once at startup from the context and the plugin
//! registry and is immutable afterwards. Each call to [`Chain::execute`]:
//!
//! 1. classifies the request with [`parse_action`];
//! 2. for a push, runs parsePush to choose the branch or tag chain;
//! 3. runs the selected processors in order, stopping as soon as the action
//!    is errored, blocked or allowed;
//! 4. removes a workspace left behind by an aborted chain;
//! 5. writes the audit record (skipped for pulls);
//! 6. spawns the automatic decision when the hook decided.
//!
//! The audit write is owned by an [`AuditGuard`]. If the execution future is
//! dropped half way, the guard's `Drop` spawns the write of the last
//! snapshot, so every attempted push leaves a record.

use crate::action::{Action, ActionKind, ActionType, Step};
use crate::auto::{attempt_auto_approval, attempt_auto_rejection};
use crate::context::ProxyContext;
use crate::plugins::PluginRegistry;
use crate::processors::{
    self, parse_action, BlockForAuth, CheckAuthorEmails, CheckCommitMessages, CheckEmptyBranch,
    CheckHiddenCommits, CheckIfWaitingAuth, CheckRepoInAuthorisedList, CheckUserPushPermission,
    ClearBareClone, GetDiff, Gitleaks, ParsePush, PreReceive, Processor, PullRemote, ScanDiff,
    WritePack,
};
use crate::request::GitRequest;
use crate::store::PushStore;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// A processor and whether it came from the plugin registry
#[derive(Debug, Clone)]
struct Link {
    processor: Arc<dyn Processor>,
    plugin: bool,
}

impl Link {
    fn builtin<P: Processor + 'static>(processor: P) -> Self {
        Link {
            processor: Arc::new(processor),
            plugin: false,
        }
    }

    fn plugin(processor: &Arc<dyn Processor>) -> Self {
        Link {
            processor: Arc::clone(processor),
            plugin: true,
        }
    }
}

/// Result of one chain execution
#[derive(Debug)]
pub struct Execution {
    /// The finished action, as audited
    pub action: Action,
    /// Automatic decision task, when the pre-receive hook decided
    pub decision: Option<JoinHandle<()>>,
}

/// Writes the audit record exactly once
#[derive(Debug)]
pub struct AuditGuard {
    store: Arc<dyn PushStore>,
    snapshot: Option<Action>,
}

impl AuditGuard {
    /// Guard `action`, to be replaced by later snapshots
    pub fn new(store: Arc<dyn PushStore>, action: &Action) -> Self {
        AuditGuard {
            store,
            snapshot: Some(action.clone()),
        }
    }

    /// Replace the snapshot that will be written
    pub fn update(&mut self, action: &Action) {
        self.snapshot = Some(action.clone());
    }

    /// Write the latest snapshot now
    pub async fn finish(mut self) {
        if let Some(action) = self.snapshot.take() {
            write_audit(self.store.as_ref(), &action).await;
        }
    }
}

impl Drop for AuditGuard {
    fn drop(&mut self) {
        let Some(action) = self.snapshot.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(action_id = %action.id, "Chain dropped before finishing, writing audit");
                let store = Arc::clone(&self.store);
                handle.spawn(async move {
                    write_audit(store.as_ref(), &action).await;
                });
            }
            Err(_) => {
                error!(action_id = %action.id, "No runtime to write the audit record");
            }
        }
    }
}

async fn write_audit(store: &dyn PushStore, action: &Action) {
    if action.is_pull() {
        debug!(action_id = %action.id, "Pull actions are not audited");
        return;
    }
    match store.write_audit(action).await {
        Ok(()) => info!(
            target: "pushgate::audit",
            action_id = %action.id,
            kind = ?action.kind,
            repo = %action.repo,
            error = action.error,
            blocked = action.blocked,
            allow_push = action.allow_push,
            auto_approved = action.auto_approved,
            auto_rejected = action.auto_rejected,
            "Audit written"
        ),
        Err(e) => error!(
            target: "pushgate::audit",
            action_id = %action.id,
            error = %e,
            "Failed to write audit"
        ),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The immutable processor chains
#[derive(Debug, Clone)]
pub struct Chain {
    ctx: ProxyContext,
    parse_push: Link,
    branch_push: Vec<Link>,
    tag_push: Vec<Link>,
    pull: Vec<Link>,
}

impl Chain {
    /// Build the chains with the registered plugins spliced in
    pub fn new(ctx: ProxyContext, plugins: &PluginRegistry) -> Self {
        let push_plugins = || plugins.push().iter().map(Link::plugin);

        let branch_push = push_plugins()
            .chain([
                Link::builtin(CheckRepoInAuthorisedList),
                Link::builtin(CheckCommitMessages),
                Link::builtin(CheckAuthorEmails),
                Link::builtin(CheckUserPushPermission),
                Link::builtin(CheckIfWaitingAuth),
                Link::builtin(PullRemote),
                Link::builtin(WritePack),
                Link::builtin(CheckEmptyBranch),
                Link::builtin(CheckHiddenCommits),
                Link::builtin(PreReceive),
                Link::builtin(GetDiff),
                Link::builtin(Gitleaks),
                Link::builtin(ClearBareClone),
                Link::builtin(ScanDiff),
                Link::builtin(BlockForAuth),
            ])
            .collect();

        let tag_push = push_plugins()
            .chain([
                Link::builtin(CheckRepoInAuthorisedList),
                Link::builtin(CheckUserPushPermission),
                Link::builtin(CheckIfWaitingAuth),
                Link::builtin(PullRemote),
                Link::builtin(WritePack),
                Link::builtin(PreReceive),
                Link::builtin(ClearBareClone),
                Link::builtin(BlockForAuth),
            ])
            .collect();

        let pull = plugins
            .pull()
            .iter()
            .map(Link::plugin)
            .chain([Link::builtin(CheckRepoInAuthorisedList)])
            .collect();

        Chain {
            ctx,
            parse_push: Link::builtin(ParsePush),
            branch_push,
            tag_push,
            pull,
        }
    }

    /// Shared context
    pub fn context(&self) -> &ProxyContext {
        &self.ctx
    }

    fn links_for(&self, action: &Action) -> &[Link] {
        match (action.kind, action.action_type) {
            (ActionKind::Pull, _) => &self.pull,
            (ActionKind::Push, Some(ActionType::Tag)) => &self.tag_push,
            (ActionKind::Push, _) => &self.branch_push,
            (ActionKind::Default, _) => &[],
        }
    }

    /// Step names the chain would run for `action`, after classification
    pub fn plan(&self, action: &Action) -> Vec<&str> {
        self.links_for(action)
            .iter()
            .map(|link| link.processor.name())
            .collect()
    }

    async fn run_link(&self, link: &Link, req: &GitRequest, action: &Action) -> Action {
        let name = link.processor.name();
        let outcome = AssertUnwindSafe(link.processor.exec(&self.ctx, req, action))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(next)) => return next,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload)),
        };

        let mut action = action.clone();
        let mut step = Step::new(name);
        if link.plugin {
            warn!(action_id = %action.id, plugin = name, error = %failure, "Plugin failed");
            step.log(format!("Plugin {name} failed: {failure}"));
        } else {
            error!(action_id = %action.id, step = name, error = %failure, "Processor failed");
            step.set_error(failure);
        }
        action.add_step(step);
        action
    }

    async fn classify(&self, req: &GitRequest) -> Action {
        let message = match AssertUnwindSafe(parse_action(&self.ctx, req))
            .catch_unwind()
            .await
        {
            Ok(Ok(action)) => return action,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload)),
        };
        error!(path = %req.path, error = %message, "Failed to classify request");

        let timestamp = Utc::now().timestamp_millis();
        let mut action = Action::new(
            timestamp.to_string(),
            ActionKind::Default,
            req.method.as_str(),
            timestamp,
            "",
        );
        let mut step = Step::new(processors::parse_action::NAME);
        step.set_error(message);
        action.add_step(step);
        action
    }

    /// Run the request through its chain
    #[instrument(skip(self, req), fields(path = %req.path))]
    pub async fn execute(&self, req: &GitRequest) -> Execution {
        let mut action = self.classify(req).await;
        let mut guard = AuditGuard::new(Arc::clone(&self.ctx.store), &action);

        if action.is_push() && action.should_continue() {
            action = self.run_link(&self.parse_push, req, &action).await;
            guard.update(&action);
        }

        if action.should_continue() {
            for link in self.links_for(&action).to_vec() {
                action = self.run_link(&link, req, &action).await;
                guard.update(&action);
                if !action.should_continue() || action.allow_push {
                    break;
                }
            }
        }

        if action.proxy_git_path.is_some() && !action.has_step(processors::clear_bare_clone::NAME)
        {
            action = self
                .run_link(&Link::builtin(ClearBareClone), req, &action)
                .await;
            guard.update(&action);
        }

        guard.finish().await;

        let store = Arc::clone(&self.ctx.store);
        let decision = if action.auto_approved {
            Some(attempt_auto_approval(store, action.id.clone()))
        } else if action.auto_rejected {
            Some(attempt_auto_rejection(store, action.id.clone()))
        } else {
            None
        };

        info!(
            action_id = %action.id,
            steps = action.steps.len(),
            error = action.error,
            blocked = action.blocked,
            allow_push = action.allow_push,
            "Chain finished"
        );
        Execution { action, decision }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pushgate_config::Config;

    fn chain(plugins: &PluginRegistry) -> Chain {
        let ctx = ProxyContext::new(Config::default(), Arc::new(MemoryStore::new())).unwrap();
        Chain::new(ctx, plugins)
    }

    fn push(action_type: ActionType) -> Action {
        let mut action = Action::new("1", ActionKind::Push, "POST", 1, "https://h/o/r.git");
        action.action_type = Some(action_type);
        action
    }

    #[test]
    fn test_branch_chain_order() {
        let chain = chain(&PluginRegistry::new());
        assert_eq!(
            chain.plan(&push(ActionType::Branch)),
            vec![
                "checkRepoInAuthorisedList",
                "checkCommitMessages",
                "checkAuthorEmails",
                "checkUserPushPermission",
                "checkIfWaitingAuth",
                "pullRemote",
                "writePack",
                "checkEmptyBranch",
                "checkHiddenCommits",
                "executeExternalPreReceiveHook",
                "diff",
                "gitleaks",
                "clearBareClone",
                "scanDiff",
                "authBlock",
            ]
        );
    }

    #[test]
    fn test_tag_chain_order() {
        let chain = chain(&PluginRegistry::new());
        assert_eq!(
            chain.plan(&push(ActionType::Tag)),
            vec![
                "checkRepoInAuthorisedList",
                "checkUserPushPermission",
                "checkIfWaitingAuth",
                "pullRemote",
                "writePack",
                "executeExternalPreReceiveHook",
                "clearBareClone",
                "authBlock",
            ]
        );
    }

    #[test]
    fn test_plugins_spliced_first() {
        let mut plugins = PluginRegistry::new();
        plugins.register_push(Arc::new(crate::plugins::CryptoUsage::new()));
        plugins.register_pull(Arc::new(crate::plugins::CryptoUsage::new()));
        let chain = chain(&plugins);

        assert_eq!(chain.plan(&push(ActionType::Branch))[0], "checkCryptoImplementation");
        assert_eq!(chain.plan(&push(ActionType::Tag))[0], "checkCryptoImplementation");

        let pull = Action::new("1", ActionKind::Pull, "POST", 1, "https://h/o/r.git");
        assert_eq!(
            chain.plan(&pull),
            vec!["checkCryptoImplementation", "checkRepoInAuthorisedList"]
        );
    }

    #[test]
    fn test_default_chain_is_empty() {
        let chain = chain(&PluginRegistry::new());
        let action = Action::new("1", ActionKind::Default, "GET", 1, "https://h/o/r.git");
        assert!(chain.plan(&action).is_empty());
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("bang".to_string())), "bang");
        assert_eq!(panic_message(Box::new(3_u8)), "unknown panic");
    }
}
