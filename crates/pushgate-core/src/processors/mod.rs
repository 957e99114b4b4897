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

//! Chain processors
//!
//! A processor takes the request and the current action and returns the next
//! action. It appends exactly one [`Step`](crate::action::Step) and never
//! lowers a flag raised by an earlier step.
//!
//! Expected failures are recorded on the step:
//!
//! | Failure | Recorded as |
//! |---------|-------------|
//! | policy violation | `step.block(..)` |
//! | malformed payload | `step.set_error(..)` |
//! | git/hook/workspace failure | `step.set_error(..)` |
//!
//! `Err` is for everything else. The chain turns it into an error step.

pub mod block_for_auth;
pub mod check_author_emails;
pub mod check_commit_messages;
pub mod check_empty_branch;
pub mod check_hidden_commits;
pub mod check_if_waiting_auth;
pub mod check_repo_in_authorised_list;
pub mod check_user_push_permission;
pub mod clear_bare_clone;
pub mod get_diff;
pub mod gitleaks;
pub mod parse_action;
pub mod parse_push;
pub mod pre_receive;
pub mod pull_remote;
pub mod scan_diff;
pub mod write_pack;

pub use block_for_auth::BlockForAuth;
pub use check_author_emails::CheckAuthorEmails;
pub use check_commit_messages::CheckCommitMessages;
pub use check_empty_branch::CheckEmptyBranch;
pub use check_hidden_commits::CheckHiddenCommits;
pub use check_if_waiting_auth::CheckIfWaitingAuth;
pub use check_repo_in_authorised_list::CheckRepoInAuthorisedList;
pub use check_user_push_permission::CheckUserPushPermission;
pub use clear_bare_clone::ClearBareClone;
pub use get_diff::GetDiff;
pub use gitleaks::Gitleaks;
pub use parse_action::parse_action;
pub use parse_push::ParsePush;
pub use pre_receive::PreReceive;
pub use pull_remote::PullRemote;
pub use scan_diff::ScanDiff;
pub use write_pack::WritePack;

use crate::action::Action;
use crate::context::ProxyContext;
use crate::error::ProcessResult;
use crate::request::GitRequest;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::PathBuf;

/// One unit of the chain; implemented by built-in processors and plugins
#[async_trait]
pub trait Processor: Send + Sync + Debug {
    /// Step name this processor records
    fn name(&self) -> &str;

    /// Run against `action` and return the updated copy
    async fn exec(
        &self,
        ctx: &ProxyContext,
        req: &GitRequest,
        action: &Action,
    ) -> ProcessResult<Action>;
}

/// `{proxyGitPath}/{repoName}`, where the bare clone lives
pub(crate) fn clone_dir(action: &Action) -> Option<PathBuf> {
    action
        .proxy_git_path
        .as_ref()
        .map(|path| path.join(&action.repo_name))
}

/// The empty tree, diffed against for a root push
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
