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

//! Action and step model
//!
//! An [`Action`] is the record of one proxied git request. Processors never
//! share one: each takes the current action by reference, clones it, appends
//! exactly one [`Step`] and returns the new value.
//!
//! # Lifecycle
//!
//! ```text
//! received -> classified -> pull | branch push | tag push
//!          -> allowed | blocked (pending review) | error
//!
//! blocked -> authorised | rejected | canceled   (out of band)
//! ```

mod step;

pub use step::Step;

use crate::urls;
use chrono::{DateTime, Utc};
use pushgate_protocol::{CommitData, RefUpdate, TagData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Request classification from the `Content-Type` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// `application/x-git-upload-pack-request`
    Pull,
    /// `application/x-git-receive-pack-request`
    Push,
    /// Anything else, e.g. ref advertisement
    #[default]
    Default,
}

/// What a push updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// `refs/heads/*`
    Branch,
    /// `refs/tags/*`
    Tag,
    /// Any other ref
    Commit,
}

/// Outcome of a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Approved for forwarding
    Authorised,
    /// Refused by a reviewer or hook
    Rejected,
    /// Withdrawn by the pusher
    Canceled,
}

/// Who made a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    /// Proxy username
    pub username: String,
    /// Account on the upstream host
    #[serde(default)]
    pub git_account: String,
}

/// Decision payload stored on the action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    /// Reviewer identity
    pub reviewer: Reviewer,
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
    /// True for decisions made by the pre-receive hook
    #[serde(default)]
    pub automated: bool,
    /// Review checklist answers
    #[serde(default)]
    pub questions: Vec<Value>,
}

impl Attestation {
    /// Attestation recorded for hook-driven decisions
    pub fn automated() -> Self {
        Attestation {
            reviewer: Reviewer {
                username: "system".to_string(),
                git_account: "system".to_string(),
            },
            timestamp: Utc::now(),
            automated: true,
            questions: Vec::new(),
        }
    }

    /// Attestation for a human reviewer
    pub fn by<U: Into<String>, G: Into<String>>(username: U, git_account: G) -> Self {
        Attestation {
            reviewer: Reviewer {
                username: username.into(),
                git_account: git_account.into(),
            },
            timestamp: Utc::now(),
            automated: false,
            questions: Vec::new(),
        }
    }
}

/// One proxied git request and its decision trail
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Action {
    /// `{commitFrom}__{commitTo}` once known, else the timestamp
    pub id: String,
    /// Pull, push or default
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Branch, tag or commit push
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
    /// HTTP method
    pub method: String,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    /// Upstream repository URL
    pub url: String,
    /// `project/repoName`
    pub repo: String,
    /// Organisation or owner, empty for a top-level repository
    pub project: String,
    /// Repository name including `.git`
    pub repo_name: String,

    /// Set by any failing step
    pub error: bool,
    /// Message of the most recent failing step
    pub error_message: Option<String>,
    /// Set by any blocking step
    pub blocked: bool,
    /// Message of the most recent blocking step
    pub blocked_message: Option<String>,
    /// The push may be forwarded upstream
    pub allow_push: bool,
    /// Approved by a reviewer or hook
    pub authorised: bool,
    /// Withdrawn
    pub canceled: bool,
    /// Refused
    pub rejected: bool,
    /// The pre-receive hook approved
    pub auto_approved: bool,
    /// The pre-receive hook refused
    pub auto_rejected: bool,

    /// Old id of the primary ref
    pub commit_from: Option<String>,
    /// New id of the primary ref
    pub commit_to: Option<String>,
    /// Full branch ref name
    pub branch: Option<String>,
    /// Full tag ref name
    pub tag: Option<String>,
    /// Pushed commits, pack order
    pub commit_data: Vec<CommitData>,
    /// Pushed annotated tags
    pub tag_data: Vec<TagData>,
    /// Every ref update in the push
    pub ref_updates: Vec<RefUpdate>,
    /// Committer name of the tip commit
    pub user: Option<String>,
    /// Committer (or tagger) email of the tip object
    pub user_email: Option<String>,

    /// Temporary workspace holding the bare clone
    pub proxy_git_path: Option<PathBuf>,
    /// Pack index files written by the push
    pub new_idx_files: Vec<String>,
    /// Processor log, in execution order
    pub steps: Vec<Step>,
    /// Last appended step
    pub last_step: Option<Step>,
    /// Review decision payload
    pub attestation: Option<Attestation>,
}

impl Action {
    /// Build the action for an inbound request.
    ///
    /// `project`, `repo_name` and `repo` are derived from `url`.
    pub fn new<I, M, U>(id: I, kind: ActionKind, method: M, timestamp: i64, url: U) -> Self
    where
        I: Into<String>,
        M: Into<String>,
        U: Into<String>,
    {
        let url = url.into();
        let (project, repo_name) = urls::name_and_org(&url)
            .map(|parts| (parts.project.unwrap_or_default(), parts.repo_name))
            .unwrap_or_default();
        let repo = if project.is_empty() {
            repo_name.clone()
        } else {
            format!("{project}/{repo_name}")
        };

        Action {
            id: id.into(),
            kind,
            method: method.into(),
            timestamp,
            url,
            repo,
            project,
            repo_name,
            ..Action::default()
        }
    }

    /// Append a step and raise the action flags it carries
    pub fn add_step(&mut self, step: Step) {
        if step.blocked() {
            self.blocked = true;
            self.blocked_message = step.blocked_message().map(str::to_string);
        }
        if step.error() {
            self.error = true;
            self.error_message = step.error_message().map(str::to_string);
        }
        self.last_step = Some(step.clone());
        self.steps.push(step);
    }

    /// True iff neither `error` nor `blocked` is set
    pub fn should_continue(&self) -> bool {
        !(self.error || self.blocked)
    }

    /// Let the push through, lifting any block
    pub fn set_allow_push(&mut self) {
        self.allow_push = true;
        self.blocked = false;
    }

    /// Record the primary ref range; this also fixes the id
    pub fn set_commit<F: Into<String>, T: Into<String>>(&mut self, from: F, to: T) {
        let from = from.into();
        let to = to.into();
        self.id = format!("{from}__{to}");
        self.commit_from = Some(from);
        self.commit_to = Some(to);
    }

    /// Apply a review outcome.
    ///
    /// Exactly one of authorised/rejected/canceled ends up set and the block
    /// is lifted.
    pub fn record_decision(&mut self, decision: Decision, attestation: Option<Attestation>) {
        self.authorised = decision == Decision::Authorised;
        self.rejected = decision == Decision::Rejected;
        self.canceled = decision == Decision::Canceled;
        self.blocked = false;
        if attestation.is_some() {
            self.attestation = attestation;
        }
    }

    /// The recorded review outcome, if any
    pub fn decision(&self) -> Option<Decision> {
        if self.authorised {
            Some(Decision::Authorised)
        } else if self.rejected {
            Some(Decision::Rejected)
        } else if self.canceled {
            Some(Decision::Canceled)
        } else {
            None
        }
    }

    /// Blocked, error-free and not yet decided
    pub fn is_pending_review(&self) -> bool {
        self.blocked && !self.error && !self.allow_push && self.decision().is_none()
    }

    /// Shorthand for `kind == Pull`
    pub fn is_pull(&self) -> bool {
        self.kind == ActionKind::Pull
    }

    /// Shorthand for `kind == Push`
    pub fn is_push(&self) -> bool {
        self.kind == ActionKind::Push
    }

    /// Whether a step with this name has run
    pub fn has_step(&self, name: &str) -> bool {
        self.steps.iter().any(|step| step.step_name == name)
    }

    /// Most recent step with this name
    pub fn find_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().rev().find(|step| step.step_name == name)
    }

    /// Names of all steps, in order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.step_name.as_str()).collect()
    }

    /// Branch or tag name without the `refs/...` prefix
    pub fn short_ref(&self) -> Option<&str> {
        self.branch
            .as_deref()
            .map(|b| b.strip_prefix("refs/heads/").unwrap_or(b))
            .or_else(|| {
                self.tag
                    .as_deref()
                    .map(|t| t.strip_prefix("refs/tags/").unwrap_or(t))
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn push() -> Action {
        Action::new(
            "1700000000000",
            ActionKind::Push,
            "POST",
            1_700_000_000_000,
            "https://github.com/finos/git-proxy.git",
        )
    }

    #[test]
    fn test_new_derives_repo_fields() {
        let action = push();
        assert_eq!(action.project, "finos");
        assert_eq!(action.repo_name, "git-proxy.git");
        assert_eq!(action.repo, "finos/git-proxy.git");
        assert!(action.should_continue());
    }

    #[test]
    fn test_new_nested_project() {
        let action = Action::new(
            "1",
            ActionKind::Pull,
            "POST",
            1,
            "https://gitlab.com/group/sub/app.git",
        );
        assert_eq!(action.project, "group/sub");
        assert_eq!(action.repo, "group/sub/app.git");
    }

    #[test]
    fn test_new_top_level_repo() {
        let action = Action::new("1", ActionKind::Pull, "POST", 1, "https://example.com/app.git");
        assert_eq!(action.project, "");
        assert_eq!(action.repo, "app.git");
    }

    #[test]
    fn test_add_step_propagates_flags() {
        let mut action = push();

        action.add_step(Step::new("ok"));
        assert!(action.should_continue());

        let mut blocked = Step::new("checkRepoInAuthorisedList");
        blocked.block("nope");
        action.add_step(blocked);

        assert!(action.blocked);
        assert!(!action.should_continue());
        assert_eq!(action.blocked_message.as_deref(), Some("nope"));
        assert_eq!(
            action.last_step.as_ref().map(|s| s.step_name.as_str()),
            Some("checkRepoInAuthorisedList")
        );

        // a later clean step never lifts the flag
        action.add_step(Step::new("later"));
        assert!(action.blocked);
    }

    #[test]
    fn test_continue_iff_no_error_and_no_block() {
        for (error, blocked) in [(false, false), (true, false), (false, true), (true, true)] {
            let mut action = push();
            action.error = error;
            action.blocked = blocked;
            assert_eq!(action.should_continue(), !(error || blocked));
        }
    }

    #[test]
    fn test_set_allow_push_lifts_block() {
        let mut action = push();
        action.blocked = true;
        action.set_allow_push();
        assert!(action.allow_push);
        assert!(action.should_continue());
    }

    #[test]
    fn test_set_commit_sets_id() {
        let mut action = push();
        action.set_commit("aaa", "bbb");
        assert_eq!(action.id, "aaa__bbb");
        assert_eq!(action.commit_to.as_deref(), Some("bbb"));
    }

    #[test]
    fn test_record_decision_is_exclusive() {
        let mut action = push();
        action.blocked = true;
        action.record_decision(Decision::Authorised, Some(Attestation::by("alice", "alice-gh")));
        assert_eq!(action.decision(), Some(Decision::Authorised));
        assert!(!action.blocked);

        action.record_decision(Decision::Canceled, None);
        assert!(action.canceled);
        assert!(!action.authorised);
        assert!(!action.rejected);
        // the earlier attestation survives a decision without one
        assert_eq!(
            action.attestation.as_ref().map(|a| a.reviewer.username.as_str()),
            Some("alice")
        );
    }

    #[test]
    fn test_serializes_type_field() {
        let mut action = push();
        action.action_type = Some(ActionType::Branch);
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "push");
        assert_eq!(json["actionType"], "branch");
        assert_eq!(json["repoName"], "git-proxy.git");

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_short_ref() {
        let mut action = push();
        action.branch = Some("refs/heads/feature/x".to_string());
        assert_eq!(action.short_ref(), Some("feature/x"));
    }
}
